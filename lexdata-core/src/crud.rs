//! Statement generation for the generic CRUD helpers.
//!
//! Every function here takes the table's [`TableSchema`] and produces a
//! [`Statement`]; the driver only renders and executes it. Column names come
//! from the schema, values are always bound parameters, and each statement
//! targets exactly one `${schema}`-qualified table.
//!
//! Ownership filters are equality conditions (`user_id = $n`) added to the
//! primary key match. A row that exists but fails an owner condition behaves
//! exactly like a missing row.

use crate::error::{DataError, DataResult, ErrorCode};
use crate::filter::{Filter, OrderBy, SortOrder};
use crate::pagination::Pagination;
use crate::record::{Patch, Record};
use crate::schema::TableSchema;
use crate::sql::{SqlBuilder, Statement};
use crate::value::Value;

/// Build `INSERT ... RETURNING *`.
///
/// Null fields are omitted so column defaults apply. A missing id is
/// generated according to the table's identity kind. The audit timestamps are
/// always `NOW()` and the active flag always starts at its default; supplying
/// any of them is a `ReadOnlyColumn` error.
pub fn insert(table: &TableSchema, record: &Record) -> DataResult<Statement> {
    let mut columns: Vec<&str> = Vec::with_capacity(record.len() + 3);
    let mut values: Vec<Option<Value>> = Vec::with_capacity(record.len() + 3);

    let pk = table.primary_key();
    for (column, value) in record.iter() {
        table.require_column(column)?;
        if column != pk && table.is_managed(column) {
            return Err(DataError::read_only_column(table.table(), column));
        }
        if value.is_null() {
            continue;
        }
        columns.push(column);
        values.push(Some(value.clone()));
    }

    if !columns.contains(&pk) {
        let id = table.identity().generate().ok_or_else(|| {
            DataError::constraint_violation(
                ErrorCode::NotNullConstraint,
                format!("Primary key '{}' must be supplied for table '{}'", pk, table.table()),
            )
            .with_table(table.table())
            .with_column(pk)
        })?;
        columns.insert(0, pk);
        values.insert(0, Some(id));
    }

    for audit in [table.created_at(), table.updated_at()].into_iter().flatten() {
        columns.push(audit);
        // None renders as NOW()
        values.push(None);
    }

    let mut sql = SqlBuilder::new();
    sql.push("INSERT INTO ").push_table(table.name()).push(" (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_sep(", ");
        }
        sql.push_identifier(column);
    }
    sql.push(") VALUES (");
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            sql.push_sep(", ");
        }
        match value {
            Some(value) => sql.push_param(value),
            None => sql.push("NOW()"),
        };
    }
    sql.push(") RETURNING *");
    Ok(sql.build())
}

/// Build a keep-unless-given `UPDATE ... RETURNING *`.
///
/// Each patched column is written as `col = COALESCE($n, col)`, so an absent
/// or null field never overwrites the stored value. The update timestamp is
/// refreshed when declared. Only active rows match.
pub fn update(table: &TableSchema, id: &Value, owners: &Record, patch: &Patch) -> DataResult<Statement> {
    let mut sql = SqlBuilder::new();
    sql.push("UPDATE ").push_table(table.name()).push(" SET ");

    let mut assignments = 0;
    for (column, value) in patch.iter() {
        table.require_column(column)?;
        if table.is_managed(column) {
            return Err(DataError::read_only_column(table.table(), column));
        }
        if value.is_null() {
            continue;
        }
        if assignments > 0 {
            sql.push_sep(", ");
        }
        sql.push_identifier(column)
            .push(" = COALESCE(")
            .push_param(value.clone())
            .push(", ")
            .push_identifier(column)
            .push(")");
        assignments += 1;
    }

    if let Some(updated_at) = table.updated_at() {
        if assignments > 0 {
            sql.push_sep(", ");
        }
        sql.push_identifier(updated_at).push(" = NOW()");
        assignments += 1;
    }

    if assignments == 0 {
        // Nothing to change; still return the row when it matches.
        let pk = table.primary_key();
        sql.push_identifier(pk).push(" = ").push_identifier(pk);
    }

    push_row_match(&mut sql, table, id, owners)?;
    sql.push(" RETURNING *");
    Ok(sql.build())
}

/// Build the soft-delete `UPDATE`: clear the active flag, refresh the update
/// timestamp, match like [`update`].
pub fn soft_delete(table: &TableSchema, id: &Value, owners: &Record) -> DataResult<Statement> {
    let active = table.active_column().ok_or_else(|| {
        DataError::invalid_schema(table.table(), "table has no soft-delete column")
            .with_suggestion("Declare the flag with TableSchemaBuilder::soft_delete")
    })?;

    let mut sql = SqlBuilder::new();
    sql.push("UPDATE ")
        .push_table(table.name())
        .push(" SET ")
        .push_identifier(active)
        .push(" = FALSE");
    if let Some(updated_at) = table.updated_at() {
        sql.push(", ").push_identifier(updated_at).push(" = NOW()");
    }
    push_row_match(&mut sql, table, id, owners)?;
    Ok(sql.build())
}

/// Build `SELECT * ... WHERE pk = $1 [AND owners] [AND active]`.
///
/// With `include_inactive` the active-flag condition is dropped so
/// soft-deleted rows can still be read explicitly.
pub fn find_by_id(
    table: &TableSchema,
    id: &Value,
    owners: &Record,
    include_inactive: bool,
) -> DataResult<Statement> {
    let mut sql = SqlBuilder::new();
    sql.push("SELECT * FROM ").push_table(table.name());
    push_key(&mut sql, table, id, owners)?;
    if !include_inactive {
        push_active(&mut sql, table);
    }
    Ok(sql.build())
}

/// Parameters of a list read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Conditions, joined with AND.
    pub filters: Vec<Filter>,
    /// Sort terms. Defaults to newest first when the table has `created_at`,
    /// otherwise primary key order.
    pub order_by: Vec<OrderBy>,
    /// Page to return.
    pub pagination: Pagination,
    /// Include soft-deleted rows.
    pub include_inactive: bool,
}

impl ListQuery {
    /// A first-page query with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a sort term.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set the page.
    pub fn page(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Include soft-deleted rows.
    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }
}

/// The row and count statements of a list read.
#[derive(Debug, Clone, PartialEq)]
pub struct ListStatements {
    /// `SELECT * ... ORDER BY ... LIMIT ... OFFSET ...`
    pub rows: Statement,
    /// `SELECT COUNT(*) AS total ...` over the same conditions.
    pub count: Statement,
}

/// Build the statements for a paginated list read.
pub fn list(table: &TableSchema, query: &ListQuery) -> DataResult<ListStatements> {
    let mut order = query.order_by.clone();
    if order.is_empty() {
        if let Some(created_at) = table.created_at() {
            order.push(OrderBy::desc(created_at));
        }
        order.push(OrderBy {
            column: table.primary_key().to_string(),
            order: SortOrder::Asc,
        });
    }
    for term in &order {
        table.require_column(&term.column)?;
    }

    let pagination = query.pagination.normalized();

    let mut rows = SqlBuilder::new();
    rows.push("SELECT * FROM ").push_table(table.name());
    push_list_where(&mut rows, table, query)?;
    rows.push(" ORDER BY ");
    for (i, term) in order.iter().enumerate() {
        if i > 0 {
            rows.push_sep(", ");
        }
        rows.push_identifier(&term.column)
            .push(" ")
            .push(term.order.as_sql());
    }
    rows.push(" LIMIT ")
        .push_param(i64::from(pagination.limit))
        .push(" OFFSET ")
        .push_param(pagination.offset() as i64);

    let mut count = SqlBuilder::new();
    count.push("SELECT COUNT(*) AS \"total\" FROM ").push_table(table.name());
    push_list_where(&mut count, table, query)?;

    Ok(ListStatements {
        rows: rows.build(),
        count: count.build(),
    })
}

fn push_list_where(sql: &mut SqlBuilder, table: &TableSchema, query: &ListQuery) -> DataResult<()> {
    let mut first = true;
    let mut next = |sql: &mut SqlBuilder| {
        sql.push(if first { " WHERE " } else { " AND " });
        first = false;
    };

    if !query.include_inactive {
        if let Some(active) = table.active_column() {
            next(sql);
            sql.push_identifier(active).push(" = TRUE");
        }
    }
    for filter in &query.filters {
        next(sql);
        filter.write(table, sql)?;
    }
    Ok(())
}

fn push_row_match(sql: &mut SqlBuilder, table: &TableSchema, id: &Value, owners: &Record) -> DataResult<()> {
    push_key(sql, table, id, owners)?;
    push_active(sql, table);
    Ok(())
}

fn push_key(sql: &mut SqlBuilder, table: &TableSchema, id: &Value, owners: &Record) -> DataResult<()> {
    if id.is_null() {
        return Err(DataError::encode("primary key value is null").with_table(table.table()));
    }
    sql.push(" WHERE ")
        .push_identifier(table.primary_key())
        .push(" = ")
        .push_param(id.clone());

    for (column, value) in owners.iter() {
        table.require_column(column)?;
        if value.is_null() {
            return Err(DataError::encode(format!("ownership filter '{}' is null", column))
                .with_table(table.table())
                .with_column(column));
        }
        sql.push(" AND ")
            .push_identifier(column)
            .push(" = ")
            .push_param(value.clone());
    }
    Ok(())
}

fn push_active(sql: &mut SqlBuilder, table: &TableSchema) {
    if let Some(active) = table.active_column() {
        sql.push(" AND ").push_identifier(active).push(" = TRUE");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType, IdentityKind};
    use pretty_assertions::assert_eq;

    fn items() -> TableSchema {
        TableSchema::builder("estimate_items")
            .id("id", IdentityKind::Uuid)
            .column(ColumnDef::new("user_id", ColumnType::Text).not_null())
            .column(ColumnDef::new("description", ColumnType::Text).not_null())
            .column(ColumnDef::new("quantity", ColumnType::Integer))
            .column(ColumnDef::new("rate", ColumnType::Double))
            .timestamps()
            .soft_delete()
            .build()
            .unwrap()
    }

    fn owners() -> Record {
        Record::new().set("user_id", "u1")
    }

    #[test]
    fn test_insert_generates_id_and_timestamps() {
        let record = Record::new()
            .set("user_id", "u1")
            .set("description", "Consulta")
            .set("quantity", 2)
            .set("rate", Value::Null);
        let stmt = insert(&items(), &record).unwrap();
        assert_eq!(
            stmt.template().source(),
            "INSERT INTO ${schema}.\"estimate_items\" (\"id\", \"user_id\", \"description\", \"quantity\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING *"
        );
        assert!(matches!(stmt.params()[0], Value::Uuid(_)));
        assert_eq!(stmt.params().len(), 4);
    }

    #[test]
    fn test_insert_keeps_supplied_id() {
        let id = uuid::Uuid::new_v4();
        let record = Record::new().set("description", "x").set("id", id);
        let stmt = insert(&items(), &record).unwrap();
        assert!(stmt.template().source().starts_with("INSERT INTO ${schema}.\"estimate_items\" (\"description\", \"id\","));
        assert_eq!(stmt.params()[1], Value::Uuid(id));
    }

    #[test]
    fn test_insert_rejects_managed_columns() {
        for (column, value) in [
            ("is_active", Value::Bool(false)),
            ("created_at", Value::from("1999-01-01T00:00:00Z")),
            ("updated_at", Value::from("1999-01-01T00:00:00Z")),
            ("is_active", Value::Null),
        ] {
            let record = Record::new().set("description", "Consulta").set(column, value);
            let err = insert(&items(), &record).unwrap_err();
            assert_eq!(err.code, ErrorCode::ReadOnlyColumn, "{}", column);
        }
    }

    #[test]
    fn test_insert_requires_provided_id() {
        let table = TableSchema::builder("t")
            .id("code", IdentityKind::Provided)
            .build()
            .unwrap();
        let err = insert(&table, &Record::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotNullConstraint);
    }

    #[test]
    fn test_insert_unknown_column() {
        let err = insert(&items(), &Record::new().set("colour", "red")).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownColumn);
    }

    #[test]
    fn test_update_uses_coalesce() {
        let patch = Record::new().set("quantity", 5).set("rate", Value::Null);
        let stmt = update(&items(), &Value::from("i1"), &owners(), &patch).unwrap();
        assert_eq!(
            stmt.template().source(),
            "UPDATE ${schema}.\"estimate_items\" SET \"quantity\" = COALESCE($1, \"quantity\"), \"updated_at\" = NOW() \
             WHERE \"id\" = $2 AND \"user_id\" = $3 AND \"is_active\" = TRUE RETURNING *"
        );
        assert_eq!(
            stmt.params(),
            &[Value::Int(5), Value::from("i1"), Value::from("u1")]
        );
    }

    #[test]
    fn test_update_rejects_managed_columns() {
        for column in ["id", "created_at", "updated_at", "is_active"] {
            let patch = Record::new().set(column, "x");
            let err = update(&items(), &Value::from("i1"), &owners(), &patch).unwrap_err();
            assert_eq!(err.code, ErrorCode::ReadOnlyColumn, "{}", column);
        }
    }

    #[test]
    fn test_empty_patch_without_timestamps() {
        let table = TableSchema::builder("t")
            .id("id", IdentityKind::Uuid)
            .column(ColumnDef::new("a", ColumnType::Integer))
            .build()
            .unwrap();
        let stmt = update(&table, &Value::from("x"), &Record::new(), &Record::new()).unwrap();
        assert_eq!(
            stmt.template().source(),
            "UPDATE ${schema}.\"t\" SET \"id\" = \"id\" WHERE \"id\" = $1 RETURNING *"
        );
    }

    #[test]
    fn test_soft_delete() {
        let stmt = soft_delete(&items(), &Value::from("i1"), &owners()).unwrap();
        assert_eq!(
            stmt.template().source(),
            "UPDATE ${schema}.\"estimate_items\" SET \"is_active\" = FALSE, \"updated_at\" = NOW() \
             WHERE \"id\" = $1 AND \"user_id\" = $2 AND \"is_active\" = TRUE"
        );
    }

    #[test]
    fn test_soft_delete_requires_flag() {
        let table = TableSchema::builder("t")
            .id("id", IdentityKind::Uuid)
            .build()
            .unwrap();
        let err = soft_delete(&table, &Value::from("x"), &Record::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSchema);
    }

    #[test]
    fn test_null_owner_rejected() {
        let owners = Record::new().set("user_id", Value::Null);
        assert!(soft_delete(&items(), &Value::from("i1"), &owners).is_err());
    }

    #[test]
    fn test_find_by_id() {
        let active = find_by_id(&items(), &Value::from("i1"), &owners(), false).unwrap();
        assert!(active.template().source().ends_with("AND \"is_active\" = TRUE"));
        let any = find_by_id(&items(), &Value::from("i1"), &owners(), true).unwrap();
        assert!(!any.template().source().contains("is_active"));
    }

    #[test]
    fn test_list() {
        let query = ListQuery::new()
            .filter(Filter::eq("user_id", "u1"))
            .page(Pagination::new(2, 10));
        let stmts = list(&items(), &query).unwrap();
        assert_eq!(
            stmts.rows.template().source(),
            "SELECT * FROM ${schema}.\"estimate_items\" WHERE \"is_active\" = TRUE AND \"user_id\" = $1 \
             ORDER BY \"created_at\" DESC, \"id\" ASC LIMIT $2 OFFSET $3"
        );
        assert_eq!(stmts.rows.params()[1..].to_vec(), vec![Value::Int(10), Value::Int(10)]);
        assert_eq!(
            stmts.count.template().source(),
            "SELECT COUNT(*) AS \"total\" FROM ${schema}.\"estimate_items\" WHERE \"is_active\" = TRUE AND \"user_id\" = $1"
        );
    }

    #[test]
    fn test_list_rejects_unknown_order_column() {
        let query = ListQuery::new().order_by(OrderBy::asc("colour"));
        assert_eq!(list(&items(), &query).unwrap_err().code, ErrorCode::UnknownColumn);
    }
}
