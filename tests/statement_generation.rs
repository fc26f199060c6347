//! Integration tests for statement generation.
//!
//! These tests exercise the catalog tables end to end without a database:
//! tenant schema derivation, placeholder rendering, provisioning plans and
//! the CRUD statements the data core sends.

use lexdata::common::crud::{self, ListQuery};
use lexdata::common::ddl::{self, DdlKind};
use lexdata::common::{Filter, Pagination, SchemaNaming, SqlTemplate, TenantId, catalog};
use lexdata::{ErrorCode, Record, Value};
use pretty_assertions::assert_eq;

fn schema_of(tenant: &str) -> lexdata::common::Identifier {
    SchemaNaming::default().schema_for(&TenantId::new(tenant)).unwrap()
}

/// The same statement renders to disjoint schemas for distinct tenants
#[test]
fn test_statement_routes_to_one_schema() {
    let table = catalog::estimate_items().unwrap();
    let stmt = crud::find_by_id(&table, &Value::from("i1"), &Record::new(), false).unwrap();

    let acme = stmt.render(&schema_of("acme"));
    let globex = stmt.render(&schema_of("globex"));
    assert!(acme.starts_with("SELECT * FROM \"tenant_acme\".\"estimate_items\""));
    assert!(globex.starts_with("SELECT * FROM \"tenant_globex\".\"estimate_items\""));
    assert!(!acme.contains("globex"));
}

/// Hostile tenant ids never reach the SQL text unescaped
#[test]
fn test_hostile_tenant_id_is_encoded() {
    let schema = schema_of("a\"; --");
    assert_eq!(schema.as_str(), "tenant_a_22_3b_20_2d_2d");
    let sql = SqlTemplate::parse("SELECT 1 FROM ${schema}.publications")
        .unwrap()
        .render(&schema);
    assert_eq!(sql, "SELECT 1 FROM \"tenant_a_22_3b_20_2d_2d\".publications");

    let err = SchemaNaming::default()
        .schema_for(&TenantId::new("acme\"; DROP SCHEMA public CASCADE; --"))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidIdentifier);
}

/// Distinct tenant ids never share a schema
#[test]
fn test_schema_naming_is_injective() {
    let ids = ["acme", "Acme", "ac_me", "ac-me", "ac.me", "acme_5f"];
    let mut schemas: Vec<String> = ids.iter().map(|id| schema_of(id).as_str().to_string()).collect();
    schemas.sort();
    schemas.dedup();
    assert_eq!(schemas.len(), ids.len());
}

/// Values are bound, never interpolated
#[test]
fn test_values_are_parameters() {
    let table = catalog::estimate_items().unwrap();
    let record = Record::new()
        .set("estimate_id", "estimate_1")
        .set("user_id", "user_1")
        .set("description", "Consulta'); DROP TABLE x; --")
        .set("quantity", 2)
        .set("rate", 100);
    let stmt = crud::insert(&table, &record).unwrap();

    let sql = stmt.render(&schema_of("acme"));
    assert!(!sql.contains("Consulta"));
    assert_eq!(stmt.params().len(), 6);
    assert!(matches!(stmt.params()[0], Value::Uuid(_)));
    assert!(sql.ends_with("NOW(), NOW()) RETURNING *"));
}

/// The publications plan creates the schema-qualified table, then additive
/// columns, then indexes
#[test]
fn test_publications_provisioning_plan() {
    let table = catalog::publications().unwrap();
    let schema = schema_of("acme");
    let steps = ddl::plan(&table);

    assert_eq!(steps[0].kind, DdlKind::Table);
    let create = steps[0].statement.render(&schema);
    assert!(create.starts_with("CREATE TABLE IF NOT EXISTS \"tenant_acme\".\"publications\" ("));
    assert!(create.contains("\"status\" VARCHAR(20) NOT NULL DEFAULT 'nova' CHECK (\"status\" IN ("));
    assert!(create.contains("UNIQUE (\"user_id\", \"external_id\")"));

    let columns: Vec<_> = steps.iter().filter(|s| s.kind == DdlKind::Column).collect();
    assert_eq!(columns.len(), 11);
    assert_eq!(columns[0].object, "publications.urgencia");
    assert!(columns
        .iter()
        .all(|s| s.statement.render(&schema).contains("ADD COLUMN IF NOT EXISTS")));

    let last = steps.last().unwrap();
    assert_eq!(last.kind, DdlKind::Index);
    assert_eq!(
        last.statement.render(&schema),
        "CREATE INDEX IF NOT EXISTS \"idx_publications_active\" ON \"tenant_acme\".\"publications\" (\"is_active\")"
    );

    assert_eq!(
        ddl::create_schema().render(&schema),
        "CREATE SCHEMA IF NOT EXISTS \"tenant_acme\""
    );
}

/// Update keeps omitted fields and scopes by owner
#[test]
fn test_owned_update() {
    let table = catalog::estimates().unwrap();
    let owners = Record::new().set("user_id", "user_1");
    let patch = Record::new().set("status", "sent").set("notes", Value::Null);
    let stmt = crud::update(&table, &Value::from("estimate_1"), &owners, &patch).unwrap();

    assert_eq!(
        stmt.render(&schema_of("acme")),
        "UPDATE \"tenant_acme\".\"estimates\" SET \"status\" = COALESCE($1, \"status\"), \"updated_at\" = NOW() \
         WHERE \"id\" = $2 AND \"user_id\" = $3 AND \"is_active\" = TRUE RETURNING *"
    );

    let err = crud::update(&table, &Value::from("estimate_1"), &owners, &Record::new().set("id", "x"))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ReadOnlyColumn);
}

/// Listing filters soft-deleted rows unless asked not to
#[test]
fn test_list_publications() {
    let table = catalog::publications().unwrap();
    let query = ListQuery::new()
        .filter(Filter::eq("user_id", "user_1"))
        .filter(Filter::gte("publication_date", "2024-01-01"))
        .page(Pagination::new(1, 20));
    let stmts = crud::list(&table, &query).unwrap();
    let rows = stmts.rows.render(&schema_of("acme"));
    assert!(rows.contains("WHERE \"is_active\" = TRUE AND \"user_id\" = $1 AND \"publication_date\" >= $2"));

    let all = crud::list(&table, &query.clone().include_inactive()).unwrap();
    assert!(!all.count.render(&schema_of("acme")).contains("is_active"));
}

/// Tables outside the catalog are refused
#[test]
fn test_unknown_table_is_refused() {
    let registry = catalog::registry().unwrap();
    let err = registry.get("invoices").unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownTable);
}
