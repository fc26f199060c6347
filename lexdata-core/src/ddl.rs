//! DDL generation for provisioning.
//!
//! Every statement is guarded with `IF NOT EXISTS` and is purely additive:
//! nothing here drops, renames or narrows a column.

use crate::ident::quote;
use crate::schema::{ColumnDef, IndexDef, TableSchema};
use crate::sql::{SqlBuilder, Statement};

/// What a provisioning step creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    /// The tenant schema itself.
    Schema,
    /// The table with its full column set.
    Table,
    /// An additive column.
    Column,
    /// An index.
    Index,
}

/// One idempotent provisioning statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DdlStep {
    /// What the step creates.
    pub kind: DdlKind,
    /// Name of the created object.
    pub object: String,
    /// The statement.
    pub statement: Statement,
}

/// `CREATE SCHEMA IF NOT EXISTS ${schema}`
pub fn create_schema() -> Statement {
    let mut builder = SqlBuilder::new();
    builder.push("CREATE SCHEMA IF NOT EXISTS ").push_schema();
    builder.build()
}

/// `CREATE TABLE IF NOT EXISTS` with every declared column and constraint.
pub fn create_table(table: &TableSchema) -> Statement {
    let mut entries: Vec<String> = table.columns().iter().map(column_definition).collect();
    entries.push(format!("PRIMARY KEY ({})", quote(table.primary_key())));
    for columns in table.unique_constraints() {
        entries.push(format!("UNIQUE ({})", column_list(columns)));
    }

    let mut builder = SqlBuilder::new();
    builder
        .push("CREATE TABLE IF NOT EXISTS ")
        .push_table(table.name())
        .push(" (\n    ")
        .push(entries.join(",\n    "))
        .push("\n)");
    builder.build()
}

/// `ALTER TABLE ... ADD COLUMN IF NOT EXISTS`
pub fn add_column(table: &TableSchema, column: &ColumnDef) -> Statement {
    let mut builder = SqlBuilder::new();
    builder
        .push("ALTER TABLE ")
        .push_table(table.name())
        .push(" ADD COLUMN IF NOT EXISTS ")
        .push(column_definition(column));
    builder.build()
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS`
pub fn create_index(table: &TableSchema, index: &IndexDef) -> Statement {
    let unique = if index.is_unique() { "UNIQUE " } else { "" };
    let mut builder = SqlBuilder::new();
    builder
        .push(format!("CREATE {}INDEX IF NOT EXISTS ", unique))
        .push_identifier(index.name())
        .push(" ON ")
        .push_table(table.name())
        .push(format!(" ({})", column_list(index.columns())));
    builder.build()
}

/// The ordered steps that bring a table up to its declared shape.
///
/// Table first, then additive columns, then indexes (which may reference
/// additive columns).
pub fn plan(table: &TableSchema) -> Vec<DdlStep> {
    let mut steps = vec![DdlStep {
        kind: DdlKind::Table,
        object: table.table().to_string(),
        statement: create_table(table),
    }];

    for column in table.additive_columns() {
        steps.push(DdlStep {
            kind: DdlKind::Column,
            object: format!("{}.{}", table.table(), column.name()),
            statement: add_column(table, column),
        });
    }

    for index in table.indexes() {
        steps.push(DdlStep {
            kind: DdlKind::Index,
            object: index.name().to_string(),
            statement: create_index(table, index),
        });
    }

    steps
}

fn column_definition(column: &ColumnDef) -> String {
    let mut parts = vec![quote(column.name()), column.column_type().sql()];

    if !column.is_nullable() {
        parts.push("NOT NULL".to_string());
    }
    if let Some(default) = column.default_value() {
        parts.push(format!("DEFAULT {}", default.sql()));
    }
    if !column.allowed_values().is_empty() {
        let values: Vec<String> = column
            .allowed_values()
            .iter()
            .map(|v| crate::ident::quote_literal(v))
            .collect();
        parts.push(format!("CHECK ({} IN ({}))", quote(column.name()), values.join(", ")));
    }

    parts.join(" ")
}

fn column_list(columns: &[String]) -> String {
    columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::Identifier;
    use crate::schema::{ColumnDefault, ColumnType, IdentityKind};
    use pretty_assertions::assert_eq;

    fn publications() -> TableSchema {
        TableSchema::builder("publications")
            .id("id", IdentityKind::Prefixed("publication".into()))
            .column(ColumnDef::new("user_id", ColumnType::Varchar(255)).not_null())
            .column(ColumnDef::new("external_id", ColumnType::Varchar(255)))
            .column(
                ColumnDef::new("source", ColumnType::Varchar(50))
                    .not_null()
                    .check_in(["CNJ-DATAJUD", "Codilo", "JusBrasil"]),
            )
            .column(
                ColumnDef::new("tags", ColumnType::Jsonb)
                    .default(ColumnDefault::EmptyJsonArray)
                    .additive(),
            )
            .timestamps()
            .unique(["user_id", "external_id"])
            .index(IndexDef::on(["user_id"]))
            .build()
            .unwrap()
    }

    fn schema() -> Identifier {
        Identifier::new("tenant_acme").unwrap()
    }

    #[test]
    fn test_create_schema() {
        assert_eq!(
            create_schema().render(&schema()),
            "CREATE SCHEMA IF NOT EXISTS \"tenant_acme\""
        );
    }

    #[test]
    fn test_create_table() {
        let sql = create_table(&publications()).render(&schema());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"tenant_acme\".\"publications\" (\n    \
             \"id\" VARCHAR(255) NOT NULL,\n    \
             \"user_id\" VARCHAR(255) NOT NULL,\n    \
             \"external_id\" VARCHAR(255),\n    \
             \"source\" VARCHAR(50) NOT NULL CHECK (\"source\" IN ('CNJ-DATAJUD', 'Codilo', 'JusBrasil')),\n    \
             \"tags\" JSONB DEFAULT '[]'::jsonb,\n    \
             \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(),\n    \
             \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(),\n    \
             PRIMARY KEY (\"id\"),\n    \
             UNIQUE (\"user_id\", \"external_id\")\n)"
        );
    }

    #[test]
    fn test_plan_order() {
        let steps = plan(&publications());
        let kinds: Vec<DdlKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![DdlKind::Table, DdlKind::Column, DdlKind::Index]);
        assert_eq!(
            steps[1].statement.render(&schema()),
            "ALTER TABLE \"tenant_acme\".\"publications\" ADD COLUMN IF NOT EXISTS \"tags\" JSONB DEFAULT '[]'::jsonb"
        );
        assert_eq!(
            steps[2].statement.render(&schema()),
            "CREATE INDEX IF NOT EXISTS \"idx_publications_user_id\" ON \"tenant_acme\".\"publications\" (\"user_id\")"
        );
    }

    #[test]
    fn test_ddl_has_no_params() {
        for step in plan(&publications()) {
            assert!(step.statement.params().is_empty());
            assert_eq!(step.statement.template().placeholder_count(), 1);
        }
    }
}
