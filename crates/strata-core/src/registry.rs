//! Schema registry: logical table name to schema and storage location.
//!
//! Jobs consult the registry once at start. Keeping it behind a trait lets
//! tests register synthetic tables without touching real storage paths.

use std::collections::BTreeMap;

use arrow::datatypes::SchemaRef;

use crate::error::{Error, Result};

/// Registered metadata for one logical table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    /// Logical table name.
    pub name: String,
    /// Schema data is cast to before being written.
    pub schema: SchemaRef,
    /// Storage location relative to the backend root.
    pub location: String,
}

impl TableMetadata {
    /// Creates table metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: SchemaRef, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema,
            location: location.into(),
        }
    }
}

/// Lookup of table metadata by logical name.
pub trait SchemaRegistry: Send + Sync {
    /// Returns metadata for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] for unknown tables.
    fn lookup(&self, name: &str) -> Result<TableMetadata>;
}

/// Registry backed by a fixed in-memory map.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    tables: BTreeMap<String, TableMetadata>,
}

impl StaticRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a table entry.
    #[must_use]
    pub fn with_table(mut self, metadata: TableMetadata) -> Self {
        self.register(metadata);
        self
    }

    /// Adds (or replaces) a table entry in place.
    pub fn register(&mut self, metadata: TableMetadata) {
        self.tables.insert(metadata.name.clone(), metadata);
    }

    /// Returns registered table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl SchemaRegistry for StaticRegistry {
    fn lookup(&self, name: &str) -> Result<TableMetadata> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::resource_not_found("table metadata", name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;

    #[test]
    fn lookup_known_and_unknown_tables() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let registry = StaticRegistry::new()
            .with_table(TableMetadata::new("b", schema.clone(), "silver/b"))
            .with_table(TableMetadata::new("a", schema, "gold/a"));

        assert_eq!(registry.lookup("a").unwrap().location, "gold/a");
        assert_eq!(registry.table_names().collect::<Vec<_>>(), vec!["a", "b"]);

        let err = registry.lookup("missing").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("missing"));
    }
}
