//! Error types for tenant data access with actionable messages.
//!
//! Every failure surfaced by the data layer is a [`DataError`] carrying an
//! [`ErrorCode`]. Codes follow the pattern `L{category}{number}`:
//!
//! - 1xxx: Tenant resolution (not found, inactive)
//! - 2xxx: Schema errors (unknown table/column, identifiers, templates, provisioning)
//! - 3xxx: Constraint violations bubbled from the database
//! - 4xxx: Connection errors (pool, network)
//! - 5xxx: Execution errors (timeout, cancellation, generic database failure)
//! - 6xxx: Data errors (row decoding, parameter encoding)
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use lexdata_core::{DataError, ErrorCode, FailureClass};
//!
//! let err = DataError::tenant_not_found("acme");
//! assert_eq!(err.code, ErrorCode::TenantNotFound);
//! assert_eq!(err.failure_class(), FailureClass::Unauthenticated);
//!
//! let err = DataError::unknown_table("invoices");
//! assert_eq!(err.failure_class(), FailureClass::Internal);
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for data access operations.
pub type DataResult<T> = Result<T, DataError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Tenant errors (1xxx)
    /// No tenant with the requested id (L1001).
    TenantNotFound = 1001,
    /// The tenant exists but is disabled (L1002).
    TenantInactive = 1002,

    // Schema errors (2xxx)
    /// No `TableSchema` registered for the table (L2001).
    UnknownTable = 2001,
    /// Column not declared by the table's schema (L2002).
    UnknownColumn = 2002,
    /// Identifier failed the allow-list (L2003).
    InvalidIdentifier = 2003,
    /// SQL template is malformed or not schema-qualified (L2004).
    InvalidTemplate = 2004,
    /// Table definition is inconsistent (L2005).
    InvalidSchema = 2005,
    /// DDL failed for a reason other than a benign race (L2006).
    ProvisionFailed = 2006,
    /// Column is maintained by the data layer and cannot be written directly (L2007).
    ReadOnlyColumn = 2007,

    // Constraint errors (3xxx)
    /// Unique constraint violation (L3001).
    UniqueConstraint = 3001,
    /// Foreign key constraint violation (L3002).
    ForeignKeyConstraint = 3002,
    /// Not null constraint violation (L3003).
    NotNullConstraint = 3003,
    /// Check constraint violation (L3004).
    CheckConstraint = 3004,

    // Connection errors (4xxx)
    /// Database connection failed (L4001).
    ConnectionFailed = 4001,
    /// Connection pool exhausted (L4002).
    PoolExhausted = 4002,
    /// Timed out waiting for a connection (L4003).
    ConnectionTimeout = 4003,

    // Execution errors (5xxx)
    /// Statement exceeded the request deadline (L5001).
    QueryTimeout = 5001,
    /// Statement abandoned because the request was cancelled (L5002).
    Cancelled = 5002,
    /// General database error (L5003).
    DatabaseError = 5003,
    /// Transaction could not be started, committed or rolled back (L5004).
    TransactionFailed = 5004,

    // Data errors (6xxx)
    /// Row shape does not match the requested type (L6001).
    DecodeError = 6001,
    /// A value could not be encoded for its column (L6002).
    EncodeError = 6002,

    // Configuration errors (7xxx)
    /// Invalid configuration (L7001).
    InvalidConfiguration = 7001,

    // Internal errors (9xxx)
    /// Internal error (L9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "L1001").
    pub fn code(&self) -> String {
        format!("L{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::TenantNotFound => "Tenant not found",
            Self::TenantInactive => "Tenant inactive",
            Self::UnknownTable => "Unknown table",
            Self::UnknownColumn => "Unknown column",
            Self::InvalidIdentifier => "Invalid identifier",
            Self::InvalidTemplate => "Invalid SQL template",
            Self::InvalidSchema => "Invalid table schema",
            Self::ProvisionFailed => "Schema provisioning failed",
            Self::ReadOnlyColumn => "Read-only column",
            Self::UniqueConstraint => "Unique constraint violation",
            Self::ForeignKeyConstraint => "Foreign key constraint violation",
            Self::NotNullConstraint => "Not null constraint violation",
            Self::CheckConstraint => "Check constraint violation",
            Self::ConnectionFailed => "Database connection failed",
            Self::PoolExhausted => "Connection pool exhausted",
            Self::ConnectionTimeout => "Connection timeout",
            Self::QueryTimeout => "Query timeout",
            Self::Cancelled => "Request cancelled",
            Self::DatabaseError => "Database error",
            Self::TransactionFailed => "Transaction failed",
            Self::DecodeError => "Row decode error",
            Self::EncodeError => "Parameter encode error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::Internal => "Internal error",
        }
    }

    /// How a caller facing an end user should surface this failure.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::TenantNotFound | Self::TenantInactive => FailureClass::Unauthenticated,
            Self::UniqueConstraint
            | Self::ForeignKeyConstraint
            | Self::NotNullConstraint
            | Self::CheckConstraint
            | Self::UnknownColumn
            | Self::ReadOnlyColumn
            | Self::EncodeError => FailureClass::ClientCorrectable,
            Self::ConnectionFailed
            | Self::PoolExhausted
            | Self::ConnectionTimeout
            | Self::QueryTimeout
            | Self::Cancelled => FailureClass::Unavailable,
            Self::UnknownTable
            | Self::InvalidIdentifier
            | Self::InvalidTemplate
            | Self::InvalidSchema
            | Self::ProvisionFailed
            | Self::DatabaseError
            | Self::TransactionFailed
            | Self::DecodeError
            | Self::InvalidConfiguration
            | Self::Internal => FailureClass::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Coarse classification used by request handlers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Treat as an authentication failure (401).
    Unauthenticated,
    /// The caller can fix the request (400/409/422).
    ClientCorrectable,
    /// Transient; the request may be retried (503/504).
    Unavailable,
    /// Server-side defect or misconfiguration (500).
    Internal,
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The tenant involved.
    pub tenant: Option<String>,
    /// The table involved.
    pub table: Option<String>,
    /// The column involved.
    pub column: Option<String>,
    /// The SQL statement (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
}

/// Errors that can occur while accessing tenant data.
#[derive(Error, Debug)]
pub struct DataError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl DataError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Set the tenant.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.context.tenant = Some(tenant.into());
        self
    }

    /// Set the table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.context.table = Some(table.into());
        self
    }

    /// Set the column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.context.column = Some(column.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create a tenant not found error.
    pub fn tenant_not_found(tenant: impl Into<String>) -> Self {
        let tenant = tenant.into();
        Self::new(ErrorCode::TenantNotFound, format!("Tenant '{}' does not exist", tenant))
            .with_tenant(tenant)
    }

    /// Create a tenant inactive error.
    pub fn tenant_inactive(tenant: impl Into<String>) -> Self {
        let tenant = tenant.into();
        Self::new(ErrorCode::TenantInactive, format!("Tenant '{}' is not active", tenant))
            .with_tenant(tenant)
    }

    /// Create an unknown table error.
    pub fn unknown_table(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ErrorCode::UnknownTable,
            format!("No table schema registered for '{}'", table),
        )
        .with_table(&table)
        .with_suggestion(format!("Register the '{}' TableSchema with the SchemaRegistry at startup", table))
    }

    /// Create an unknown column error.
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        let table = table.into();
        let column = column.into();
        Self::new(
            ErrorCode::UnknownColumn,
            format!("Column '{}' is not declared on table '{}'", column, table),
        )
        .with_table(table)
        .with_column(column)
    }

    /// Create a read-only column error.
    pub fn read_only_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        let table = table.into();
        let column = column.into();
        Self::new(
            ErrorCode::ReadOnlyColumn,
            format!("Column '{}' on table '{}' cannot be set directly", column, table),
        )
        .with_table(table)
        .with_column(column)
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidIdentifier,
            format!("Invalid identifier '{}': {}", name.into(), reason.into()),
        )
    }

    /// Create an invalid template error.
    pub fn invalid_template(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTemplate, format!("Invalid SQL template: {}", message.into()))
            .with_suggestion("Reference tenant tables as ${schema}.table_name")
    }

    /// Create an invalid schema error.
    pub fn invalid_schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ErrorCode::InvalidSchema,
            format!("Invalid schema for '{}': {}", table, message.into()),
        )
        .with_table(table)
    }

    /// Create a provisioning error.
    pub fn provision(table: impl Into<String>, message: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ErrorCode::ProvisionFailed,
            format!("Failed to provision '{}': {}", table, message.into()),
        )
        .with_table(table)
    }

    /// Create a constraint violation error with the given constraint code.
    pub fn constraint_violation(code: ErrorCode, message: impl Into<String>) -> Self {
        debug_assert!(matches!(
            code,
            ErrorCode::UniqueConstraint
                | ErrorCode::ForeignKeyConstraint
                | ErrorCode::NotNullConstraint
                | ErrorCode::CheckConstraint
        ));
        Self::new(code, message)
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message.into()))
            .with_suggestion("Check that the database server is running")
            .with_suggestion("Verify the connection URL is correct")
    }

    /// Create a pool exhausted error.
    pub fn pool_exhausted(max_connections: usize) -> Self {
        Self::new(
            ErrorCode::PoolExhausted,
            format!("Connection pool exhausted (max {} connections)", max_connections),
        )
        .with_suggestion("Increase max_connections in the pool configuration")
        .with_suggestion("Ensure tenant contexts are dropped at the end of each request")
    }

    /// Create a connection timeout error.
    pub fn connection_timeout(duration_ms: u64) -> Self {
        Self::new(
            ErrorCode::ConnectionTimeout,
            format!("Timed out acquiring a connection after {}ms", duration_ms),
        )
    }

    /// Create a query timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::new(ErrorCode::QueryTimeout, format!("Query timed out after {}ms", duration_ms))
    }

    /// Create a cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Statement abandoned: request was cancelled")
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionFailed, format!("Transaction error: {}", message.into()))
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DecodeError, format!("Failed to decode row: {}", message.into()))
            .with_suggestion("Check that the target type matches the table's columns")
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncodeError, format!("Failed to encode parameter: {}", message.into()))
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, format!("Configuration error: {}", message.into()))
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
    }

    // ============== Error Checks ==============

    /// How a request handler should surface this failure.
    pub fn failure_class(&self) -> FailureClass {
        self.code.failure_class()
    }

    /// Check if this is a tenant resolution error.
    pub fn is_tenant_error(&self) -> bool {
        matches!(self.code, ErrorCode::TenantNotFound | ErrorCode::TenantInactive)
    }

    /// Check if this is a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::UniqueConstraint
                | ErrorCode::ForeignKeyConstraint
                | ErrorCode::NotNullConstraint
                | ErrorCode::CheckConstraint
        )
    }

    /// Check if this is a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        self.code == ErrorCode::UniqueConstraint
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConnectionFailed | ErrorCode::PoolExhausted | ErrorCode::ConnectionTimeout
        )
    }

    /// Check if the statement was abandoned by deadline or cancellation.
    pub fn is_abandoned(&self) -> bool {
        matches!(self.code, ErrorCode::QueryTimeout | ErrorCode::Cancelled)
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = format!("Error [{}]: {}\n", self.code.code(), self.message);

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref tenant) = self.context.tenant {
            output.push_str(&format!("  → Tenant: {}\n", tenant));
        }
        if let Some(ref table) = self.context.table {
            output.push_str(&format!("  → Table: {}\n", table));
        }
        if let Some(ref column) = self.context.column {
            output.push_str(&format!("  → Column: {}\n", column));
        }
        if let Some(ref sql) = self.context.sql {
            let shown: String = sql.chars().take(200).collect();
            let ellipsis = if sql.chars().count() > 200 { "..." } else { "" };
            output.push_str(&format!("  → SQL: {}{}\n", shown, ellipsis));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::TenantNotFound.code(), "L1001");
        assert_eq!(ErrorCode::UnknownTable.code(), "L2001");
        assert_eq!(ErrorCode::UniqueConstraint.code(), "L3001");
        assert_eq!(ErrorCode::PoolExhausted.code(), "L4002");
    }

    #[test]
    fn test_failure_classes() {
        assert_eq!(
            DataError::tenant_inactive("acme").failure_class(),
            FailureClass::Unauthenticated
        );
        assert_eq!(
            DataError::provision("publications", "permission denied").failure_class(),
            FailureClass::Internal
        );
        assert_eq!(
            DataError::constraint_violation(ErrorCode::UniqueConstraint, "dup").failure_class(),
            FailureClass::ClientCorrectable
        );
        assert_eq!(DataError::pool_exhausted(10).failure_class(), FailureClass::Unavailable);
    }

    #[test]
    fn test_checks() {
        assert!(DataError::tenant_not_found("x").is_tenant_error());
        assert!(DataError::constraint_violation(ErrorCode::CheckConstraint, "c").is_constraint_violation());
        assert!(!DataError::constraint_violation(ErrorCode::CheckConstraint, "c").is_unique_violation());
        assert!(DataError::connection("refused").is_connection_error());
        assert!(DataError::timeout(50).is_abandoned());
        assert!(DataError::cancelled().is_abandoned());
    }

    #[test]
    fn test_display_full() {
        let err = DataError::unknown_column("publications", "colour")
            .with_context("Updating publication")
            .with_tenant("acme");

        let output = err.display_full();
        assert!(output.contains("L2002"));
        assert!(output.contains("publications"));
        assert!(output.contains("colour"));
        assert!(output.contains("acme"));
    }

    #[test]
    fn test_display_truncates_sql_on_char_boundary() {
        let sql = "é".repeat(300);
        let output = DataError::database("boom").with_sql(sql).display_full();
        assert!(output.contains("..."));
    }
}
