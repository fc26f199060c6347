//! # lexdata-core
//!
//! Driver-independent building blocks of the lexdata tenant data layer.
//!
//! This crate provides:
//! - Tenant identity, schema naming and resolution ([`tenant`])
//! - Schema-qualified SQL templates with the `${schema}` placeholder
//! - Declarative table definitions and idempotent DDL plans
//! - Statement generation for insert, partial update, soft delete and listing
//! - Request deadlines and cancellation
//! - A structured error taxonomy shared by every backend
//!
//! Nothing here talks to a database; `lexdata-postgres` executes what this
//! crate builds.
//!
//! ## Example
//!
//! ```rust
//! use lexdata_core::{Identifier, SqlTemplate};
//!
//! let template = SqlTemplate::parse("SELECT * FROM ${schema}.publications WHERE id = $1").unwrap();
//! let schema = Identifier::new("tenant_acme").unwrap();
//! assert_eq!(
//!     template.render(&schema),
//!     r#"SELECT * FROM "tenant_acme".publications WHERE id = $1"#
//! );
//! ```

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod crud;
pub mod ddl;
pub mod error;
pub mod filter;
pub mod ident;
pub mod import;
pub mod logging;
pub mod pagination;
pub mod record;
pub mod registry;
pub mod schema;
pub mod sql;
pub mod template;
pub mod tenant;
pub mod value;

pub use cancel::{CancelHandle, CancelSignal, RequestScope};
pub use config::LexdataConfig;
pub use crud::{ListQuery, ListStatements};
pub use ddl::{DdlKind, DdlStep};
pub use error::{DataError, DataResult, ErrorCode, FailureClass};
pub use filter::{Filter, OrderBy, SortOrder};
pub use ident::Identifier;
pub use import::{ImportFailure, ImportPolicy, ImportReport};
pub use pagination::{Page, Pagination};
pub use record::{Patch, Record};
pub use registry::SchemaRegistry;
pub use schema::{ColumnDef, ColumnDefault, ColumnType, IdentityKind, IndexDef, TableSchema};
pub use sql::{SqlBuilder, Statement};
pub use template::{SCHEMA_PLACEHOLDER, SqlTemplate};
pub use tenant::{SchemaNaming, Tenant, TenantId, TenantResolver};
pub use value::Value;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cancel::{CancelHandle, CancelSignal, RequestScope};
    pub use crate::error::{DataError, DataResult, ErrorCode};
    pub use crate::filter::{Filter, OrderBy};
    pub use crate::pagination::{Page, Pagination};
    pub use crate::record::{Patch, Record};
    pub use crate::schema::{ColumnDef, ColumnDefault, ColumnType, IdentityKind, IndexDef, TableSchema};
    pub use crate::template::SqlTemplate;
    pub use crate::tenant::{Tenant, TenantId, TenantResolver};
    pub use crate::value::Value;
    pub use crate::crud::ListQuery;
}
