//! Declarative table definitions.
//!
//! A [`TableSchema`] is the single description of a tenant table: its columns
//! in creation order, the identity column, audit and soft-delete columns, and
//! the indexes and unique constraints the provisioner must keep in place.
//! Column and index names are validated once, in [`TableSchemaBuilder::build`],
//! so everything downstream can quote them without re-checking.
//!
//! ```rust
//! use lexdata_core::schema::{ColumnDef, ColumnType, IdentityKind, IndexDef, TableSchema};
//!
//! let items = TableSchema::builder("estimate_items")
//!     .id("id", IdentityKind::Uuid)
//!     .column(ColumnDef::new("description", ColumnType::Text).not_null())
//!     .column(ColumnDef::new("quantity", ColumnType::Integer).not_null())
//!     .column(ColumnDef::new("rate", ColumnType::Numeric { precision: 12, scale: 2 }))
//!     .timestamps()
//!     .soft_delete()
//!     .index(IndexDef::on(["description"]))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(items.primary_key(), "id");
//! assert_eq!(items.indexes()[0].name(), "idx_estimate_items_description");
//! ```

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{DataError, DataResult};
use crate::ident::{quote_literal, Identifier};
use crate::value::Value;

/// Postgres column types a table may declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// `TEXT`
    Text,
    /// `VARCHAR(n)`
    Varchar(u32),
    /// `INTEGER`
    Integer,
    /// `BIGINT`
    BigInt,
    /// `NUMERIC(precision, scale)`
    Numeric {
        /// Total digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// `DOUBLE PRECISION`
    Double,
    /// `BOOLEAN`
    Boolean,
    /// `DATE`
    Date,
    /// `TIMESTAMP` (without time zone)
    Timestamp,
    /// `TIMESTAMPTZ`
    TimestampTz,
    /// `JSONB`
    Jsonb,
    /// `UUID`
    Uuid,
    /// `TEXT[]`
    TextArray,
}

impl ColumnType {
    /// The SQL type name.
    pub fn sql(&self) -> String {
        match self {
            Self::Text => "TEXT".to_string(),
            Self::Varchar(n) => format!("VARCHAR({})", n),
            Self::Integer => "INTEGER".to_string(),
            Self::BigInt => "BIGINT".to_string(),
            Self::Numeric { precision, scale } => format!("NUMERIC({}, {})", precision, scale),
            Self::Double => "DOUBLE PRECISION".to_string(),
            Self::Boolean => "BOOLEAN".to_string(),
            Self::Date => "DATE".to_string(),
            Self::Timestamp => "TIMESTAMP".to_string(),
            Self::TimestampTz => "TIMESTAMPTZ".to_string(),
            Self::Jsonb => "JSONB".to_string(),
            Self::Uuid => "UUID".to_string(),
            Self::TextArray => "TEXT[]".to_string(),
        }
    }

    fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Varchar(_))
    }
}

/// Column default expressions. Only fixed forms are allowed; there is no raw
/// SQL escape hatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    /// `NOW()`
    Now,
    /// `CURRENT_DATE`
    CurrentDate,
    /// `gen_random_uuid()`
    RandomUuid,
    /// `TRUE` / `FALSE`
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A numeric literal.
    Float(f64),
    /// A quoted string literal.
    Text(String),
    /// `'[]'::jsonb`
    EmptyJsonArray,
    /// `'{}'::jsonb`
    EmptyJsonObject,
    /// `'{}'::text[]`
    EmptyTextArray,
}

impl ColumnDefault {
    /// The SQL default expression.
    pub fn sql(&self) -> String {
        match self {
            Self::Now => "NOW()".to_string(),
            Self::CurrentDate => "CURRENT_DATE".to_string(),
            Self::RandomUuid => "gen_random_uuid()".to_string(),
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => quote_literal(s),
            Self::EmptyJsonArray => "'[]'::jsonb".to_string(),
            Self::EmptyJsonObject => "'{}'::jsonb".to_string(),
            Self::EmptyTextArray => "'{}'::text[]".to_string(),
        }
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    name: String,
    ty: ColumnType,
    nullable: bool,
    default: Option<ColumnDefault>,
    allowed: Vec<String>,
    additive: bool,
}

impl ColumnDef {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            default: None,
            allowed: Vec::new(),
            additive: false,
        }
    }

    /// Mark the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default expression.
    pub fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Restrict values with `CHECK (col IN (...))`.
    pub fn check_in<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the column as added after the table's first release.
    ///
    /// Additive columns are also applied with `ADD COLUMN IF NOT EXISTS` so
    /// tables created by older releases catch up.
    pub fn additive(mut self) -> Self {
        self.additive = true;
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column type.
    pub fn column_type(&self) -> &ColumnType {
        &self.ty
    }

    /// Whether NULL is allowed.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The default expression, if any.
    pub fn default_value(&self) -> Option<&ColumnDefault> {
        self.default.as_ref()
    }

    /// Values allowed by the CHECK list. Empty means unrestricted.
    pub fn allowed_values(&self) -> &[String] {
        &self.allowed
    }

    /// Whether the column is additive.
    pub fn is_additive(&self) -> bool {
        self.additive
    }
}

/// How primary key values are produced on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKind {
    /// A random UUID.
    Uuid,
    /// Text of the form `<prefix>_<uuid>`.
    Prefixed(String),
    /// Supplied by the caller.
    Provided,
}

impl IdentityKind {
    /// Column type used for the identity column.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Uuid => ColumnType::Uuid,
            Self::Prefixed(_) => ColumnType::Varchar(255),
            Self::Provided => ColumnType::Text,
        }
    }

    /// Generate a fresh id, or `None` if the caller must supply one.
    pub fn generate(&self) -> Option<Value> {
        match self {
            Self::Uuid => Some(Value::Uuid(Uuid::new_v4())),
            Self::Prefixed(prefix) => Some(Value::Text(format!("{}_{}", prefix, Uuid::new_v4().simple()))),
            Self::Provided => None,
        }
    }
}

/// An index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

impl IndexDef {
    /// Index the given columns. The name defaults to `idx_<table>_<columns>`.
    pub fn on<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: String::new(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Set an explicit index name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Index name (empty until the table is built, if defaulted).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indexed columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the index is unique.
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// A validated table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: Identifier,
    columns: Vec<ColumnDef>,
    primary_key: String,
    identity: IdentityKind,
    created_at: Option<String>,
    updated_at: Option<String>,
    active_column: Option<String>,
    unique_constraints: Vec<Vec<String>>,
    indexes: Vec<IndexDef>,
}

impl TableSchema {
    /// Start building a table definition.
    pub fn builder(name: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder::new(name)
    }

    /// Table name.
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// Table name as a string.
    pub fn table(&self) -> &str {
        self.name.as_str()
    }

    /// Columns in creation order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Look up a column.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column that must be declared.
    pub fn require_column(&self, name: &str) -> DataResult<&ColumnDef> {
        self.column(name)
            .ok_or_else(|| DataError::unknown_column(self.table(), name))
    }

    /// Primary key column name.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// How ids are produced.
    pub fn identity(&self) -> &IdentityKind {
        &self.identity
    }

    /// Creation timestamp column, if declared.
    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    /// Update timestamp column, if declared.
    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    /// Soft-delete flag column, if declared.
    pub fn active_column(&self) -> Option<&str> {
        self.active_column.as_deref()
    }

    /// Composite unique constraints.
    pub fn unique_constraints(&self) -> &[Vec<String>] {
        &self.unique_constraints
    }

    /// Indexes, with names resolved.
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Columns applied with `ADD COLUMN IF NOT EXISTS`.
    pub fn additive_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.additive)
    }

    /// Whether the column is maintained by the core (id, timestamps, active flag).
    pub fn is_managed(&self, column: &str) -> bool {
        column == self.primary_key
            || self.created_at.as_deref() == Some(column)
            || self.updated_at.as_deref() == Some(column)
            || self.active_column.as_deref() == Some(column)
    }
}

/// Builder for [`TableSchema`].
#[derive(Debug, Clone)]
pub struct TableSchemaBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Option<(String, IdentityKind)>,
    created_at: Option<String>,
    updated_at: Option<String>,
    active_column: Option<String>,
    unique_constraints: Vec<Vec<String>>,
    indexes: Vec<IndexDef>,
}

impl TableSchemaBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            created_at: None,
            updated_at: None,
            active_column: None,
            unique_constraints: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Declare the primary key column.
    pub fn id(mut self, name: impl Into<String>, identity: IdentityKind) -> Self {
        let name = name.into();
        self.columns
            .push(ColumnDef::new(name.clone(), identity.column_type()).not_null());
        self.primary_key = Some((name, identity));
        self
    }

    /// Add a column.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Add `created_at` and `updated_at` columns maintained by the core.
    pub fn timestamps(mut self) -> Self {
        for name in ["created_at", "updated_at"] {
            self.columns.push(
                ColumnDef::new(name, ColumnType::TimestampTz)
                    .not_null()
                    .default(ColumnDefault::Now),
            );
        }
        self.created_at = Some("created_at".to_string());
        self.updated_at = Some("updated_at".to_string());
        self
    }

    /// Add an `is_active` flag; rows are soft-deleted by clearing it.
    pub fn soft_delete(self) -> Self {
        self.soft_delete_column("is_active")
    }

    /// Use a custom soft-delete flag column.
    pub fn soft_delete_column(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.columns.push(
            ColumnDef::new(name.clone(), ColumnType::Boolean)
                .not_null()
                .default(ColumnDefault::Bool(true)),
        );
        self.active_column = Some(name);
        self
    }

    /// Add a composite `UNIQUE (...)` constraint.
    pub fn unique<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_constraints
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add an index.
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Validate and build the table definition.
    pub fn build(self) -> DataResult<TableSchema> {
        let name = Identifier::new(&self.name)
            .map_err(|e| DataError::invalid_schema(&self.name, e.message))?;
        let table = name.as_str().to_string();
        let invalid = |msg: String| DataError::invalid_schema(&table, msg);

        let (primary_key, identity) = self
            .primary_key
            .ok_or_else(|| invalid("no primary key declared".to_string()))?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            Identifier::new(&column.name).map_err(|e| invalid(e.message))?;
            if !seen.insert(column.name.as_str()) {
                return Err(invalid(format!("column '{}' declared twice", column.name)));
            }
            if column.additive {
                if column.name == primary_key {
                    return Err(invalid("the primary key cannot be additive".to_string()));
                }
                if !column.nullable && column.default.is_none() {
                    return Err(invalid(format!(
                        "additive column '{}' must be nullable or have a default",
                        column.name
                    )));
                }
            }
            if !column.allowed.is_empty() && !column.ty.is_textual() {
                return Err(invalid(format!(
                    "CHECK value list on non-text column '{}'",
                    column.name
                )));
            }
        }

        let declared = |cols: &[String]| -> DataResult<()> {
            if cols.is_empty() {
                return Err(invalid("empty column list".to_string()));
            }
            for col in cols {
                if !seen.contains(col.as_str()) {
                    return Err(DataError::unknown_column(&table, col));
                }
            }
            Ok(())
        };

        for constraint in &self.unique_constraints {
            declared(constraint)?;
        }

        let mut indexes = Vec::with_capacity(self.indexes.len());
        let mut index_names = HashSet::new();
        for mut index in self.indexes {
            declared(&index.columns)?;
            if index.name.is_empty() {
                index.name = format!("idx_{}_{}", table, index.columns.join("_"));
            }
            Identifier::new(&index.name).map_err(|e| {
                invalid(e.message).with_suggestion("Give the index an explicit name with IndexDef::named")
            })?;
            if !index_names.insert(index.name.clone()) {
                return Err(invalid(format!("index '{}' declared twice", index.name)));
            }
            indexes.push(index);
        }

        Ok(TableSchema {
            name,
            columns: self.columns,
            primary_key,
            identity,
            created_at: self.created_at,
            updated_at: self.updated_at,
            active_column: self.active_column,
            unique_constraints: self.unique_constraints,
            indexes,
        })
    }
}
