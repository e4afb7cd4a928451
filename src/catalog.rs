//! Catalog layer — namespaces, tables, and the type registry.
//!
//! The catalog is a process-wide map. Tables hand out shared references
//! (`Arc<RwLock<…>>`): readers scan behind the read side while each table's
//! writes serialize behind the write side, so catalog readers never block
//! on table writers.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::StorageKind;
use crate::error::ShaleError;
use crate::plan::CollectionName;
use crate::schema::ComputedSchema;
use crate::table::ColumnarTable;
use crate::types::LogicalType;

/// A table plus its declared storage kind.
#[derive(Debug)]
pub struct TableEntry {
    pub storage: StorageKind,
    pub table: ColumnarTable,
}

/// Shared handle to one table. Writers take the write side; a table's
/// primary-key hash lives inside and is covered by the same lock.
pub type TableRef = Arc<RwLock<TableEntry>>;

/// A namespace path: `["app", "prod"]`.
pub type NamespacePath = Vec<String>;

#[derive(Debug, Default)]
struct NamespaceInfo {
    tables: BTreeMap<String, TableRef>,
}

/// Namespace → table map plus the registered-type table.
#[derive(Debug, Default)]
pub struct Catalog {
    namespaces: BTreeMap<NamespacePath, NamespaceInfo>,
    types: BTreeMap<String, LogicalType>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Namespaces ───────────────────────────────────────────────────────

    pub fn create_namespace(&mut self, path: &[String]) -> Result<(), ShaleError> {
        if path.is_empty() {
            return Err(ShaleError::Unsupported("empty namespace path".into()));
        }
        if self.namespaces.contains_key(path) {
            return Err(ShaleError::Unsupported(format!(
                "namespace '{}' already exists",
                path.join(".")
            )));
        }
        if path.len() > 1 && !self.namespaces.contains_key(&path[..path.len() - 1]) {
            return Err(ShaleError::NotFound(format!(
                "parent namespace '{}'",
                path[..path.len() - 1].join(".")
            )));
        }
        self.namespaces.insert(path.to_vec(), NamespaceInfo::default());
        debug!(namespace = path.join("."), "namespace created");
        Ok(())
    }

    /// Drop an empty namespace. Namespaces with tables or child namespaces
    /// refuse the drop.
    pub fn drop_namespace(&mut self, path: &[String]) -> Result<(), ShaleError> {
        let info = self
            .namespaces
            .get(path)
            .ok_or_else(|| ShaleError::NotFound(format!("namespace '{}'", path.join("."))))?;
        if !info.tables.is_empty() {
            return Err(ShaleError::Unsupported(format!(
                "namespace '{}' still holds {} table(s)",
                path.join("."),
                info.tables.len()
            )));
        }
        if self.has_child_namespaces(path) {
            return Err(ShaleError::Unsupported(format!(
                "namespace '{}' has child namespaces",
                path.join(".")
            )));
        }
        self.namespaces.remove(path);
        Ok(())
    }

    pub fn namespace_exists(&self, path: &[String]) -> bool {
        self.namespaces.contains_key(path)
    }

    pub fn list_root_namespaces(&self) -> Vec<NamespacePath> {
        self.namespaces
            .keys()
            .filter(|p| p.len() == 1)
            .cloned()
            .collect()
    }

    pub fn list_child_namespaces(&self, parent: &[String]) -> Vec<NamespacePath> {
        self.namespaces
            .keys()
            .filter(|p| p.len() == parent.len() + 1 && p.starts_with(parent))
            .cloned()
            .collect()
    }

    pub fn list_all_namespaces(&self) -> Vec<NamespacePath> {
        self.namespaces.keys().cloned().collect()
    }

    pub fn has_child_namespaces(&self, path: &[String]) -> bool {
        self.namespaces
            .keys()
            .any(|p| p.len() > path.len() && p.starts_with(path))
    }

    pub fn get_all_descendants(&self, path: &[String]) -> Vec<NamespacePath> {
        self.namespaces
            .keys()
            .filter(|p| p.len() > path.len() && p.starts_with(path))
            .cloned()
            .collect()
    }

    // ── Tables ───────────────────────────────────────────────────────────

    pub fn create_table(
        &mut self,
        name: &CollectionName,
        storage: StorageKind,
        block_capacity: usize,
    ) -> Result<TableRef, ShaleError> {
        let info = self
            .namespaces
            .get_mut(&name.namespace)
            .ok_or_else(|| {
                ShaleError::NotFound(format!("namespace '{}'", name.namespace.join(".")))
            })?;
        if info.tables.contains_key(&name.name) {
            return Err(ShaleError::Unsupported(format!(
                "table '{name}' already exists"
            )));
        }
        let entry = Arc::new(RwLock::new(TableEntry {
            storage,
            table: ColumnarTable::new(ComputedSchema::new(storage), block_capacity),
        }));
        info.tables.insert(name.name.clone(), Arc::clone(&entry));
        debug!(table = %name, ?storage, "table created");
        Ok(entry)
    }

    pub fn drop_table(&mut self, name: &CollectionName) -> Result<(), ShaleError> {
        let info = self
            .namespaces
            .get_mut(&name.namespace)
            .ok_or_else(|| {
                ShaleError::NotFound(format!("namespace '{}'", name.namespace.join(".")))
            })?;
        info.tables
            .remove(&name.name)
            .map(|_| ())
            .ok_or_else(|| ShaleError::NotFound(format!("table '{name}'")))
    }

    pub fn get_table(&self, name: &CollectionName) -> Result<TableRef, ShaleError> {
        self.namespaces
            .get(&name.namespace)
            .and_then(|info| info.tables.get(&name.name))
            .cloned()
            .ok_or_else(|| ShaleError::NotFound(format!("table '{name}'")))
    }

    pub fn table_exists(&self, name: &CollectionName) -> bool {
        self.namespaces
            .get(&name.namespace)
            .is_some_and(|info| info.tables.contains_key(&name.name))
    }

    pub fn list_tables(&self, namespace: &[String]) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|info| info.tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    // ── Type registry ────────────────────────────────────────────────────

    /// Register a named type. The alias is the registry key.
    pub fn create_type(&mut self, ty: LogicalType) -> Result<(), ShaleError> {
        let alias = ty
            .alias()
            .ok_or_else(|| ShaleError::Unsupported("registered types need an alias".into()))?
            .to_string();
        if self.types.contains_key(&alias) {
            return Err(ShaleError::Unsupported(format!(
                "type '{alias}' already registered"
            )));
        }
        self.types.insert(alias, ty);
        Ok(())
    }

    pub fn drop_type(&mut self, alias: &str) -> Result<(), ShaleError> {
        self.types
            .remove(alias)
            .map(|_| ())
            .ok_or_else(|| ShaleError::NotFound(format!("type '{alias}'")))
    }

    pub fn type_exists(&self, alias: &str) -> bool {
        self.types.contains_key(alias)
    }

    pub fn get_type(&self, alias: &str) -> Result<&LogicalType, ShaleError> {
        self.types
            .get(alias)
            .ok_or_else(|| ShaleError::NotFound(format!("type '{alias}'")))
    }

    pub fn clear(&mut self) {
        self.namespaces.clear();
        self.types.clear();
    }

    pub fn size(&self) -> usize {
        self.namespaces.len()
    }
}
