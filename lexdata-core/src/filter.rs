//! Row filters and ordering for list queries.
//!
//! Filters name columns by string; they are checked against the table's
//! [`TableSchema`] when the statement is built, so an undeclared column is an
//! error rather than an identifier pushed into SQL.

use std::fmt;

use crate::error::DataResult;
use crate::schema::TableSchema;
use crate::sql::SqlBuilder;
use crate::value::Value;

/// A filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equals comparison. A null value becomes `IS NULL`.
    Equals(String, Value),
    /// Not equals comparison. A null value becomes `IS NOT NULL`.
    NotEquals(String, Value),
    /// Less than comparison.
    Lt(String, Value),
    /// Less than or equal comparison.
    Lte(String, Value),
    /// Greater than comparison.
    Gt(String, Value),
    /// Greater than or equal comparison.
    Gte(String, Value),
    /// In a list of values. An empty list matches nothing.
    In(String, Vec<Value>),
    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),
    /// Case-insensitive substring match on any of the columns.
    Search(Vec<String>, String),
    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
}

impl Filter {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals(column.into(), value.into())
    }

    /// `column >= value`
    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(column.into(), value.into())
    }

    /// `column <= value`
    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(column.into(), value.into())
    }

    /// Substring search across columns.
    pub fn search<I, S>(columns: I, term: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Search(columns.into_iter().map(Into::into).collect(), term.into())
    }

    /// Write the condition into a builder, binding every value.
    pub fn write(&self, table: &TableSchema, sql: &mut SqlBuilder) -> DataResult<()> {
        match self {
            Self::Equals(col, val) if val.is_null() => {
                column(table, sql, col)?.push(" IS NULL");
            }
            Self::NotEquals(col, val) if val.is_null() => {
                column(table, sql, col)?.push(" IS NOT NULL");
            }
            Self::Equals(col, val) => compare(table, sql, col, " = ", val)?,
            Self::NotEquals(col, val) => compare(table, sql, col, " <> ", val)?,
            Self::Lt(col, val) => compare(table, sql, col, " < ", val)?,
            Self::Lte(col, val) => compare(table, sql, col, " <= ", val)?,
            Self::Gt(col, val) => compare(table, sql, col, " > ", val)?,
            Self::Gte(col, val) => compare(table, sql, col, " >= ", val)?,
            Self::In(col, values) => {
                table.require_column(col)?;
                if values.is_empty() {
                    sql.push("FALSE");
                } else {
                    sql.push_identifier(col).push(" IN (");
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            sql.push_sep(", ");
                        }
                        sql.push_param(val.clone());
                    }
                    sql.push(")");
                }
            }
            Self::IsNull(col) => {
                column(table, sql, col)?.push(" IS NULL");
            }
            Self::IsNotNull(col) => {
                column(table, sql, col)?.push(" IS NOT NULL");
            }
            Self::Search(columns, term) => {
                if columns.is_empty() {
                    sql.push("TRUE");
                    return Ok(());
                }
                for col in columns {
                    table.require_column(col)?;
                }
                // One parameter shared by every column.
                let index = sql.next_param_index();
                sql.push("(");
                for (i, col) in columns.iter().enumerate() {
                    if i > 0 {
                        sql.push_sep(" OR ");
                    }
                    sql.push_identifier(col).push(" ILIKE ");
                    if i == 0 {
                        sql.push_param(format!("%{}%", escape_like(term)));
                    } else {
                        sql.push(format!("${}", index));
                    }
                }
                sql.push(")");
            }
            Self::And(filters) => group(table, sql, filters, " AND ", "TRUE")?,
            Self::Or(filters) => group(table, sql, filters, " OR ", "FALSE")?,
        }
        Ok(())
    }
}

fn column<'a>(table: &TableSchema, sql: &'a mut SqlBuilder, col: &str) -> DataResult<&'a mut SqlBuilder> {
    table.require_column(col)?;
    Ok(sql.push_identifier(col))
}

fn compare(table: &TableSchema, sql: &mut SqlBuilder, col: &str, op: &str, val: &Value) -> DataResult<()> {
    column(table, sql, col)?.push(op).push_param(val.clone());
    Ok(())
}

fn group(
    table: &TableSchema,
    sql: &mut SqlBuilder,
    filters: &[Filter],
    sep: &str,
    empty: &str,
) -> DataResult<()> {
    if filters.is_empty() {
        sql.push(empty);
        return Ok(());
    }
    sql.push("(");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            sql.push_sep(sep);
        }
        filter.write(table, sql)?;
    }
    sql.push(")");
    Ok(())
}

/// Escape `%`, `_` and `\` so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to sort by.
    pub column: String,
    /// Direction.
    pub order: SortOrder,
}

impl OrderBy {
    /// Ascending on a column.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending on a column.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }
}
