//! # lexdata
//!
//! A tenant-scoped data access layer for applications that keep each
//! customer's data in its own Postgres schema.
//!
//! lexdata provides:
//! - Tenant resolution against a directory, with caching
//! - Statements written once against the `${schema}` placeholder and routed
//!   to exactly one tenant schema, with values always bound as parameters
//! - Declarative table definitions, provisioned lazily and idempotently
//! - Insert, keep-unless-given update and soft delete with ownership filters
//! - Request deadlines and cancellation down to the in-flight statement
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lexdata::prelude::*;
//!
//! #[derive(serde::Deserialize)]
//! struct EstimateItem {
//!     id: String,
//!     description: String,
//!     quantity: f64,
//!     rate: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DataError> {
//!     let core = DataCore::connect(&LexdataConfig::from_file("lexdata.toml")?).await?;
//!     let ctx = core.resolve_tenant("acme").await?;
//!     core.ensure_registered(&ctx, "estimate_items").await?;
//!
//!     let item: EstimateItem = core
//!         .insert(&ctx, "estimate_items", &Record::new()
//!             .set("estimate_id", "estimate_1")
//!             .set("user_id", "user_1")
//!             .set("description", "Consulta")
//!             .set("quantity", 2)
//!             .set("rate", 100))
//!         .await?;
//!
//!     let owners = Record::new().set("user_id", "user_1");
//!     let updated: Option<EstimateItem> = core
//!         .update(&ctx, "estimate_items", item.id.as_str(), &owners, &Patch::new().set("rate", 120))
//!         .await?;
//!     assert_eq!(updated.map(|i| i.description), Some("Consulta".to_string()));
//!
//!     core.shutdown();
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Driver-independent building blocks.
pub mod common {
    pub use lexdata_core::*;
}

/// The PostgreSQL backend.
pub mod postgres {
    pub use lexdata_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use lexdata_core::prelude::*;
    pub use lexdata_core::{ImportPolicy, ImportReport, LexdataConfig, catalog};
    pub use lexdata_postgres::prelude::*;
}

// Re-export key types at the crate root
pub use lexdata_core::{DataError, DataResult, ErrorCode, LexdataConfig, Record, TableSchema, Value};
pub use lexdata_postgres::{DataCore, TenantContext, TenantSession};
