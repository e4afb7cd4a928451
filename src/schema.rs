//! The computed schema: a versioned catalog of columns discovered from
//! inserted documents.
//!
//! Each JSON-pointer path maps to a refcounted [`VersionedValue`] of logical
//! types. The first type seen under a path becomes the column's physical
//! type and stays there; a conflicting type does not rewrite the column but
//! flips it to a tagged union and appends the new type to `union_types` in
//! first-seen order. Removing the last alive type version under a path
//! removes the column.
//!
//! Column ids are dense and never recycled within a run.

use std::collections::HashMap;

use tracing::trace;

use crate::config::StorageKind;
use crate::error::ShaleError;
use crate::types::LogicalType;
use crate::versioned::{AppendResult, VersionedValue};

/// Outcome of [`ComputedSchema::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The path was registered for the first time.
    New,
    /// An existing type version's refcount was extended.
    Existing,
    /// The path existed with other types; the column is now (or already
    /// was) a union and carries the new variant.
    UnionExtended,
}

/// One discovered column.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Dense id assigned at first discovery; never recycled.
    pub column_id: u32,
    /// Normalized JSON-pointer path, without the leading slash.
    pub path: String,
    /// The column's physical backing type: the first type seen. Promotion
    /// to union does not change it.
    pub ty: LogicalType,
    pub is_union: bool,
    /// Distinct types in first-seen order; the index is the union tag.
    pub union_types: Vec<LogicalType>,
}

#[derive(Debug, Clone)]
struct FieldEntry {
    column_id: u32,
    path: String,
    versions: VersionedValue<LogicalType>,
    is_union: bool,
    union_types: Vec<LogicalType>,
}

/// The live mapping from path to column type, with union promotion on
/// conflict.
#[derive(Debug, Clone)]
pub struct ComputedSchema {
    /// Insertion order of first discovery.
    fields: Vec<FieldEntry>,
    /// Path -> position in `fields`. Entry lifetime equals the field's.
    index: HashMap<String, usize>,
    next_column_id: u32,
    storage_format: StorageKind,
}

impl ComputedSchema {
    pub fn new(storage_format: StorageKind) -> Self {
        Self {
            fields: Vec::new(),
            index: HashMap::new(),
            next_column_id: 0,
            storage_format,
        }
    }

    pub fn storage_format(&self) -> StorageKind {
        self.storage_format
    }

    /// Register one reference to `ty` under `path`.
    ///
    /// Never fails; a conflicting type widens the column to a union.
    pub fn append(&mut self, path: &str, ty: LogicalType) -> AppendOutcome {
        if let Some(&slot) = self.index.get(path) {
            let entry = &mut self.fields[slot];
            match entry.versions.append(ty.clone()) {
                AppendResult::Extended(_) => AppendOutcome::Existing,
                AppendResult::Created(_) => {
                    entry.is_union = true;
                    if !entry.union_types.contains(&ty) {
                        entry.union_types.push(ty);
                    }
                    AppendOutcome::UnionExtended
                }
            }
        } else {
            let column_id = self.next_column_id;
            self.next_column_id += 1;
            let mut versions = VersionedValue::new();
            versions.append(ty.clone());
            self.index.insert(path.to_string(), self.fields.len());
            self.fields.push(FieldEntry {
                column_id,
                path: path.to_string(),
                versions,
                is_union: false,
                union_types: vec![ty],
            });
            AppendOutcome::New
        }
    }

    /// Release one reference to `ty` under `path`.
    pub fn drop(&mut self, path: &str, ty: &LogicalType) {
        self.drop_n(path, ty, 1);
    }

    /// Release `n` references to `ty` under `path`.
    ///
    /// If this drops the path's last alive version the column is erased.
    /// Dropping an absent path or type is a no-op.
    pub fn drop_n(&mut self, path: &str, ty: &LogicalType, n: usize) {
        let Some(&slot) = self.index.get(path) else {
            trace!(path, "drop on absent path ignored");
            return;
        };
        let entry = &mut self.fields[slot];
        if !entry.versions.release(ty, n) {
            trace!(path, "drop on absent type version ignored");
            return;
        }
        if !entry.versions.has_alive() {
            self.fields.remove(slot);
            self.index.remove(path);
            for (i, field) in self.fields.iter().enumerate().skip(slot) {
                self.index.insert(field.path.clone(), i);
            }
        }
    }

    /// Pure conflict check: errors when `path` already holds a different
    /// type under a non-union column. Does not mutate.
    pub fn try_append(&self, path: &str, ty: &LogicalType) -> Result<(), ShaleError> {
        if let Some(&slot) = self.index.get(path) {
            let entry = &self.fields[slot];
            if entry.is_union {
                return Ok(());
            }
            if let Some(existing) = entry.versions.latest() {
                if existing.tag() != ty.tag() {
                    return Err(ShaleError::SchemaConflict(format!(
                        "type mismatch for path '{path}': existing type is {existing}, new type is {ty}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of live columns. Union promotion does not change it.
    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    pub fn has_field(&self, path: &str) -> bool {
        self.index
            .get(path)
            .is_some_and(|&slot| self.fields[slot].versions.has_alive())
    }

    /// Latest alive type under `path`, or NA when absent.
    pub fn field_type(&self, path: &str) -> LogicalType {
        self.index
            .get(path)
            .and_then(|&slot| self.fields[slot].versions.latest())
            .cloned()
            .unwrap_or(LogicalType::NA)
    }

    /// All alive type versions under `path`, insertion-ordered.
    pub fn find_field_versions(&self, path: &str) -> Vec<LogicalType> {
        self.index
            .get(path)
            .map(|&slot| self.fields[slot].versions.iter_alive().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the live columns as a STRUCT whose field aliases are the
    /// column paths and whose field types are the latest alive versions.
    pub fn latest_types_struct(&self) -> LogicalType {
        let fields = self
            .fields
            .iter()
            .filter_map(|entry| {
                entry
                    .versions
                    .latest()
                    .map(|ty| ty.clone().with_alias(entry.path.clone()))
            })
            .collect();
        LogicalType::struct_type(fields)
    }

    /// Ordered `(path, column type)` pairs for the live columns, aliases
    /// applied. The column type is the physical backing type (first-seen),
    /// wrapped into a UNION type for promoted columns.
    pub fn column_definitions(&self) -> Vec<(String, LogicalType)> {
        self.fields
            .iter()
            .map(|entry| {
                let ty = Self::entry_storage_type(entry).with_alias(entry.path.clone());
                (entry.path.clone(), ty)
            })
            .collect()
    }

    /// Column metadata for `path`, if live.
    pub fn column_info(&self, path: &str) -> Option<ColumnInfo> {
        self.index.get(path).map(|&slot| {
            let entry = &self.fields[slot];
            ColumnInfo {
                column_id: entry.column_id,
                path: entry.path.clone(),
                ty: entry.union_types[0].clone(),
                is_union: entry.is_union,
                union_types: entry.union_types.clone(),
            }
        })
    }

    /// All live columns in discovery order.
    pub fn columns(&self) -> impl Iterator<Item = ColumnInfo> + '_ {
        self.fields.iter().map(|entry| ColumnInfo {
            column_id: entry.column_id,
            path: entry.path.clone(),
            ty: entry.union_types[0].clone(),
            is_union: entry.is_union,
            union_types: entry.union_types.clone(),
        })
    }

    /// Position of `path` among the live columns (scan column index).
    pub fn column_position(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// The tag of `ty` within the union under `path`.
    pub fn get_union_tag(&self, path: &str, ty: &LogicalType) -> Result<u8, ShaleError> {
        let slot = self
            .index
            .get(path)
            .ok_or_else(|| ShaleError::NotFound(format!("no column at path '{path}'")))?;
        let entry = &self.fields[*slot];
        entry
            .union_types
            .iter()
            .position(|t| t == ty)
            .map(|i| i as u8)
            .ok_or_else(|| {
                ShaleError::Type(format!(
                    "column '{path}' carries no union variant of type {ty}"
                ))
            })
    }

    fn entry_storage_type(entry: &FieldEntry) -> LogicalType {
        if entry.is_union {
            LogicalType::union_type(entry.union_types.clone())
        } else {
            entry.union_types[0].clone()
        }
    }
}
