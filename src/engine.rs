//! The embedded engine: a catalog plus statement execution.
//!
//! DDL nodes mutate the catalog directly; DML nodes are lowered by the
//! planner and run through the operator pipeline. Each statement gets its
//! own [`PipelineContext`] carrying the bind parameters and the configured
//! wall-clock deadline.

use std::sync::RwLock;
use std::time::Instant;

use tracing::debug;

use crate::catalog::Catalog;
use crate::config::{EngineConfig, StorageKind};
use crate::error::ShaleError;
use crate::exec::{Cursor, PipelineContext, execute_root};
use crate::plan::params::ParameterStore;
use crate::plan::{Limit, LogicalNode};
use crate::planner;

/// An embedded analytical storage and query engine.
#[derive(Debug)]
pub struct Engine {
    catalog: RwLock<Catalog>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ShaleError> {
        config.validate()?;
        Ok(Self {
            catalog: RwLock::new(Catalog::new()),
            config,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            catalog: RwLock::new(Catalog::new()),
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RwLock<Catalog> {
        &self.catalog
    }

    /// Execute one statement. Errors attach to the returned cursor.
    pub fn execute(&self, node: &LogicalNode, params: &ParameterStore) -> Cursor {
        match self.try_execute(node, params) {
            Ok(cursor) => cursor,
            Err(err) => {
                debug!(error = %err, "statement rejected");
                Cursor {
                    error: Some(err),
                    ..Default::default()
                }
            }
        }
    }

    fn try_execute(
        &self,
        node: &LogicalNode,
        params: &ParameterStore,
    ) -> Result<Cursor, ShaleError> {
        // DDL short-circuits into the catalog.
        match node {
            LogicalNode::CreateDatabase { namespace } => {
                self.catalog_mut()?.create_namespace(namespace)?;
                return Ok(Cursor::default());
            }
            LogicalNode::DropDatabase { namespace } => {
                self.catalog_mut()?.drop_namespace(namespace)?;
                return Ok(Cursor::default());
            }
            LogicalNode::CreateCollection {
                collection,
                storage,
            } => {
                // A schema-less CREATE TABLE defaults to dynamic columnar
                // storage.
                let storage = storage.unwrap_or(self.config.default_storage);
                let block_capacity = self.config.chunk_capacity;
                self.catalog_mut()?
                    .create_table(collection, storage, block_capacity)?;
                return Ok(Cursor::default());
            }
            LogicalNode::DropCollection { collection } => {
                self.catalog_mut()?.drop_table(collection)?;
                return Ok(Cursor::default());
            }
            LogicalNode::CreateType { ty } => {
                self.catalog_mut()?.create_type(ty.clone())?;
                return Ok(Cursor::default());
            }
            LogicalNode::DropType { alias } => {
                self.catalog_mut()?.drop_type(alias)?;
                return Ok(Cursor::default());
            }
            _ => {}
        }

        let mut root = {
            let catalog = self
                .catalog
                .read()
                .map_err(|_| ShaleError::Internal("catalog lock poisoned".into()))?;
            let opts = planner::PlanOptions {
                scan_batch_rows: self.config.scan_batch_rows,
            };
            planner::plan(&catalog, node, Limit::unbounded(), opts)?
        };

        let ctx = match self.config.statement_timeout {
            Some(timeout) => PipelineContext::with_deadline(params, Instant::now() + timeout),
            None => PipelineContext::new(params),
        };
        Ok(execute_root(&mut root, &ctx))
    }

    /// Convenience for tests and embedding callers: create a table in a
    /// (possibly new) namespace.
    pub fn create_table(
        &self,
        collection: &crate::plan::CollectionName,
        storage: StorageKind,
    ) -> Result<(), ShaleError> {
        let mut catalog = self.catalog_mut()?;
        if !catalog.namespace_exists(&collection.namespace) {
            catalog.create_namespace(&collection.namespace)?;
        }
        catalog.create_table(collection, storage, self.config.chunk_capacity)?;
        Ok(())
    }

    fn catalog_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, Catalog>, ShaleError> {
        self.catalog
            .write()
            .map_err(|_| ShaleError::Internal("catalog lock poisoned".into()))
    }
}
