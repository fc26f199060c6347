//! # lexdata-postgres
//!
//! PostgreSQL backend for the lexdata tenant data layer.
//!
//! This crate provides:
//! - Connection pool management using `deadpool-postgres`
//! - [`TenantContext`]: a resolved tenant bound to one pooled connection
//! - Schema-qualified statement execution with deadlines and server-side cancel
//! - Idempotent, race-tolerant table provisioning ([`SchemaProvisioner`])
//! - A database-backed tenant directory ([`PgTenantDirectory`])
//! - The [`DataCore`] facade with the generic CRUD helpers
//!
//! ## Example
//!
//! ```rust,ignore
//! use lexdata_core::{LexdataConfig, Record, Value};
//! use lexdata_postgres::{DataCore, TenantSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let core = DataCore::connect(&LexdataConfig::from_file("lexdata.toml")?).await?;
//!
//!     let ctx = core.resolve_tenant("acme").await?;
//!     core.ensure_registered(&ctx, "publications").await?;
//!
//!     let rows: Vec<serde_json::Value> = ctx
//!         .query(
//!             "SELECT * FROM ${schema}.publications WHERE user_id = $1 AND is_active = TRUE",
//!             vec![Value::from("user_1")],
//!         )
//!         .await?;
//!
//!     core.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod directory;
pub mod engine;
pub mod error;
pub mod executor;
pub mod pool;
pub mod provision;
pub mod row;
pub mod types;

pub use config::{PgConfig, SslMode};
pub use context::{TenantContext, TenantTransaction};
pub use directory::PgTenantDirectory;
pub use engine::DataCore;
pub use error::{PgError, PgResult, is_benign_ddl_race};
pub use executor::{QuerySettings, TenantSession};
pub use pool::{PgPool, PgPoolBuilder, PoolConfig, PoolStatus};
pub use provision::SchemaProvisioner;
pub use row::PgRow;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::context::{TenantContext, TenantTransaction};
    pub use crate::engine::DataCore;
    pub use crate::error::{PgError, PgResult};
    pub use crate::executor::TenantSession;
    pub use crate::pool::{PgPool, PgPoolBuilder};
    pub use crate::row::PgRow;
}
