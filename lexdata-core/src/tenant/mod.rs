//! Tenant identity, schema naming and resolution.
//!
//! Every tenant owns one Postgres schema. The schema name is derived from the
//! tenant id by [`SchemaNaming`] when the tenant is onboarded and is
//! re-validated as an [`Identifier`](crate::ident::Identifier) whenever it is
//! read back, so request input never reaches the identifier path directly.
//!
//! ```rust
//! use lexdata_core::tenant::{SchemaNaming, StaticResolver, Tenant, TenantId, TenantResolver};
//!
//! # tokio_test_block(async {
//! let naming = SchemaNaming::default();
//! let id = TenantId::new("acme");
//! let resolver = StaticResolver::new();
//! resolver.register(Tenant::new(id.clone(), naming.schema_for(&id).unwrap()));
//!
//! let tenant = resolver.resolve(&id).await.unwrap();
//! assert_eq!(tenant.schema.as_str(), "tenant_acme");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod context;
mod resolver;

pub use context::{SchemaNaming, Tenant, TenantId};
pub use resolver::{CachingResolver, StaticResolver, TenantResolver};
