//! Error types for PostgreSQL operations.
//!
//! Driver errors are wrapped in [`PgError`] and converted into the shared
//! [`DataError`] taxonomy by SQLSTATE. The original driver error stays
//! attached as the `source`, so callers (and the provisioner) can still
//! inspect it.

use std::io;

use lexdata_core::{DataError, ErrorCode};
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Type conversion error.
    #[error("type conversion error: {0}")]
    TypeConversion(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion(message.into())
    }

    /// The SQLSTATE reported by the server, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => e.code().map(|c| c.code()),
            _ => None,
        }
    }
}

impl From<PgError> for DataError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Pool(deadpool_postgres::PoolError::Backend(e)) => from_postgres(e),
            PgError::Pool(e) => DataError::connection(e.to_string()),
            PgError::Postgres(e) => from_postgres(e),
            PgError::Config(msg) => DataError::config(msg),
            PgError::TypeConversion(msg) => DataError::encode(msg),
        }
    }
}

fn from_postgres(err: tokio_postgres::Error) -> DataError {
    let Some(db) = err.as_db_error() else {
        let io_failure = std::error::Error::source(&err).is_some_and(|s| s.is::<io::Error>());
        let mapped = if err.is_closed() || io_failure {
            DataError::connection(err.to_string())
        } else {
            DataError::database(err.to_string())
        };
        return mapped.with_source(err);
    };

    let code = db.code().code().to_string();
    let message = db.message().to_string();
    let table = db.table().map(String::from);
    let column = db.column().map(String::from);

    let mut mapped = match code.as_str() {
        "23505" => DataError::constraint_violation(ErrorCode::UniqueConstraint, message),
        "23503" => DataError::constraint_violation(ErrorCode::ForeignKeyConstraint, message),
        "23502" => DataError::constraint_violation(ErrorCode::NotNullConstraint, message),
        "23514" => DataError::constraint_violation(ErrorCode::CheckConstraint, message),
        "57014" if message.contains("statement timeout") => {
            DataError::new(ErrorCode::QueryTimeout, message)
        }
        "57014" => DataError::new(ErrorCode::Cancelled, message),
        "53300" | "57P01" => DataError::connection(message),
        c if c.starts_with("08") => DataError::connection(message),
        "40001" | "40P01" | "25P02" => DataError::transaction(message),
        "42P01" => DataError::database(message)
            .with_suggestion("Call ensure_table for this table before querying it"),
        _ => DataError::database(message),
    };

    if let Some(table) = table {
        mapped = mapped.with_table(table);
    }
    if let Some(column) = column {
        mapped = mapped.with_column(column);
    }
    mapped.with_context(format!("SQLSTATE {}", code)).with_source(err)
}

/// Catalog indexes whose unique violations signal a concurrent
/// `CREATE ... IF NOT EXISTS` of the same object.
const CATALOG_INDEXES: &[&str] = &[
    "pg_type_typname_nsp_index",
    "pg_namespace_nspname_index",
    "pg_class_relname_nsp_index",
];

/// Check if an error is the losing side of a concurrent DDL race.
///
/// Two sessions running the same `CREATE ... IF NOT EXISTS` can both pass the
/// existence check; the slower one then fails with a duplicate-object error
/// even though the object it wanted now exists.
pub fn is_benign_ddl_race(err: &DataError) -> bool {
    let Some(db) = err
        .source
        .as_deref()
        .and_then(|s| s.downcast_ref::<tokio_postgres::Error>())
        .and_then(|e| e.as_db_error())
    else {
        return false;
    };

    match db.code().code() {
        // duplicate_table, duplicate_schema, duplicate_column, duplicate_object
        "42P07" | "42P06" | "42701" | "42710" => true,
        "23505" => db.constraint().is_some_and(|c| CATALOG_INDEXES.contains(&c)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PgError::config("invalid URL");
        assert!(matches!(err, PgError::Config(_)));
        assert_eq!(err.sqlstate(), None);
    }

    #[test]
    fn test_into_data_error() {
        let err: DataError = PgError::config("missing host").into();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);

        let err: DataError = PgError::type_conversion("expected uuid").into();
        assert_eq!(err.code, ErrorCode::EncodeError);
    }

    #[test]
    fn test_plain_errors_are_not_races() {
        assert!(!is_benign_ddl_race(&DataError::database("relation exists")));
        assert!(!is_benign_ddl_race(
            &DataError::internal("wrapped").with_source(io::Error::other("boom"))
        ));
    }
}
