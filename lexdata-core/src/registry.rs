//! Registry of known table definitions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{DataError, DataResult};
use crate::schema::TableSchema;

/// Maps table names to their definitions.
///
/// CRUD helpers look tables up here and refuse anything unregistered, so a
/// table can only be written once its definition is known to the process.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table definition, replacing any previous one with the same name.
    pub fn register(&self, schema: TableSchema) -> Arc<TableSchema> {
        let schema = Arc::new(schema);
        let previous = self
            .tables
            .write()
            .insert(schema.table().to_string(), Arc::clone(&schema));
        debug!(table = %schema.table(), replaced = previous.is_some(), "Registered table schema");
        schema
    }

    /// Look up a table definition.
    pub fn get(&self, table: &str) -> DataResult<Arc<TableSchema>> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| DataError::unknown_table(table))
    }

    /// Check whether a table is registered.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// Registered table names, sorted.
    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<TableSchema> for SchemaRegistry {
    fn from_iter<I: IntoIterator<Item = TableSchema>>(iter: I) -> Self {
        let registry = Self::new();
        for schema in iter {
            registry.register(schema);
        }
        registry
    }
}
