//! Table definitions of the application's own tenant tables.
//!
//! Each domain service declares its tables here once; the provisioner and the
//! CRUD helpers work from these definitions.

use crate::error::DataResult;
use crate::registry::SchemaRegistry;
use crate::schema::{ColumnDef, ColumnDefault, ColumnType, IdentityKind, IndexDef, TableSchema};

/// Publication sources accepted by the `source` column.
pub const PUBLICATION_SOURCES: &[&str] = &["CNJ-DATAJUD", "Codilo", "JusBrasil"];

/// Publication workflow states.
pub const PUBLICATION_STATUSES: &[&str] = &["nova", "pendente", "atribuida", "finalizada", "descartada"];

/// Publication urgency levels.
pub const URGENCY_LEVELS: &[&str] = &["baixa", "media", "alta"];

/// Estimate currencies.
pub const CURRENCIES: &[&str] = &["BRL", "USD", "EUR"];

/// Estimate workflow states.
pub const ESTIMATE_STATUSES: &[&str] = &[
    "draft",
    "sent",
    "viewed",
    "approved",
    "rejected",
    "pending",
    "cancelled",
];

fn varchar(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Varchar(255))
}

fn money(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Numeric { precision: 14, scale: 2 })
}

/// Legal publications tracked per user.
///
/// Columns after `status` shipped later than the table and are additive.
pub fn publications() -> DataResult<TableSchema> {
    TableSchema::builder("publications")
        .id("id", IdentityKind::Prefixed("publication".to_string()))
        .column(varchar("user_id").not_null())
        .column(ColumnDef::new("oab_number", ColumnType::Varchar(50)).not_null())
        .column(ColumnDef::new("process_number", ColumnType::Varchar(100)))
        .column(ColumnDef::new("publication_date", ColumnType::Date).not_null())
        .column(ColumnDef::new("content", ColumnType::Text).not_null())
        .column(
            ColumnDef::new("source", ColumnType::Varchar(50))
                .not_null()
                .check_in(PUBLICATION_SOURCES.iter().copied()),
        )
        .column(varchar("external_id"))
        .column(
            ColumnDef::new("status", ColumnType::Varchar(20))
                .not_null()
                .default(ColumnDefault::Text("nova".to_string()))
                .check_in(PUBLICATION_STATUSES.iter().copied()),
        )
        .column(
            ColumnDef::new("urgencia", ColumnType::Varchar(10))
                .default(ColumnDefault::Text("media".to_string()))
                .check_in(URGENCY_LEVELS.iter().copied())
                .additive(),
        )
        .column(varchar("responsavel").additive())
        .column(varchar("vara_comarca").additive())
        .column(varchar("nome_pesquisado").additive())
        .column(varchar("diario").additive())
        .column(ColumnDef::new("observacoes", ColumnType::Text).additive())
        .column(varchar("atribuida_para_id").additive())
        .column(varchar("atribuida_para_nome").additive())
        .column(ColumnDef::new("data_atribuicao", ColumnType::TimestampTz).additive())
        .column(
            ColumnDef::new("tarefas_vinculadas", ColumnType::Jsonb)
                .default(ColumnDefault::EmptyJsonArray)
                .additive(),
        )
        .column(
            ColumnDef::new("metadata", ColumnType::Jsonb)
                .default(ColumnDefault::EmptyJsonObject)
                .additive(),
        )
        .timestamps()
        .soft_delete()
        .unique(["user_id", "external_id"])
        .index(IndexDef::on(["user_id"]))
        .index(IndexDef::on(["oab_number"]))
        .index(IndexDef::on(["status"]))
        .index(IndexDef::on(["publication_date"]).named("idx_publications_date"))
        .index(IndexDef::on(["responsavel"]))
        .index(IndexDef::on(["urgencia"]))
        .index(IndexDef::on(["is_active"]).named("idx_publications_active"))
        .build()
}

/// Client estimates (quotes).
pub fn estimates() -> DataResult<TableSchema> {
    TableSchema::builder("estimates")
        .id("id", IdentityKind::Prefixed("estimate".to_string()))
        .column(varchar("user_id").not_null())
        .column(ColumnDef::new("number", ColumnType::Varchar(50)).not_null())
        .column(varchar("title").not_null())
        .column(ColumnDef::new("description", ColumnType::Text))
        .column(varchar("client_id"))
        .column(varchar("client_email"))
        .column(ColumnDef::new("client_phone", ColumnType::Varchar(50)))
        .column(money("amount").not_null())
        .column(
            ColumnDef::new("currency", ColumnType::Varchar(3))
                .not_null()
                .default(ColumnDefault::Text("BRL".to_string()))
                .check_in(CURRENCIES.iter().copied()),
        )
        .column(
            ColumnDef::new("status", ColumnType::Varchar(20))
                .not_null()
                .default(ColumnDefault::Text("draft".to_string()))
                .check_in(ESTIMATE_STATUSES.iter().copied()),
        )
        .column(ColumnDef::new("date", ColumnType::Date).not_null())
        .column(ColumnDef::new("valid_until", ColumnType::Date))
        .column(
            ColumnDef::new("tags", ColumnType::TextArray)
                .not_null()
                .default(ColumnDefault::EmptyTextArray),
        )
        .column(ColumnDef::new("notes", ColumnType::Text))
        .column(
            ColumnDef::new("converted_to_invoice", ColumnType::Boolean)
                .not_null()
                .default(ColumnDefault::Bool(false)),
        )
        .column(varchar("invoice_id"))
        .timestamps()
        .soft_delete()
        .unique(["user_id", "number"])
        .index(IndexDef::on(["user_id"]))
        .index(IndexDef::on(["status"]))
        .index(IndexDef::on(["date"]))
        .build()
}

/// Line items of an estimate.
pub fn estimate_items() -> DataResult<TableSchema> {
    TableSchema::builder("estimate_items")
        .id("id", IdentityKind::Uuid)
        .column(varchar("estimate_id"))
        .column(varchar("user_id"))
        .column(ColumnDef::new("description", ColumnType::Text).not_null())
        .column(
            ColumnDef::new("quantity", ColumnType::Numeric { precision: 12, scale: 3 })
                .not_null()
                .default(ColumnDefault::Int(1)),
        )
        .column(money("rate").not_null().default(ColumnDefault::Int(0)))
        .column(money("amount"))
        .column(ColumnDef::new("tax", ColumnType::Numeric { precision: 5, scale: 2 }))
        .timestamps()
        .soft_delete()
        .index(IndexDef::on(["estimate_id"]))
        .build()
}

/// A registry holding every catalog table.
pub fn registry() -> DataResult<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    registry.register(publications()?);
    registry.register(estimates()?);
    registry.register(estimate_items()?);
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl;

    #[test]
    fn test_catalog_builds() {
        let registry = registry().unwrap();
        assert_eq!(
            registry.tables(),
            vec!["estimate_items", "estimates", "publications"]
        );
    }

    #[test]
    fn test_publications_shape() {
        let table = publications().unwrap();
        assert_eq!(table.additive_columns().count(), 11);
        assert_eq!(table.indexes().len(), 7);
        assert_eq!(table.indexes()[3].name(), "idx_publications_date");
        assert_eq!(table.unique_constraints()[0], vec!["user_id", "external_id"]);
        // table + 11 columns + 7 indexes
        assert_eq!(ddl::plan(&table).len(), 19);
    }

    #[test]
    fn test_estimates_ids_are_prefixed() {
        let table = estimates().unwrap();
        assert_eq!(table.identity(), &IdentityKind::Prefixed("estimate".to_string()));
        assert!(table.column("tags").is_some());
    }
}
