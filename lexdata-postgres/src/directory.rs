//! Database-backed tenant directory.
//!
//! The directory is a control table outside every tenant schema:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "public"."tenants" (
//!     "id" VARCHAR(255) PRIMARY KEY,
//!     "schema_name" VARCHAR(63) NOT NULL UNIQUE,
//!     "is_active" BOOLEAN NOT NULL DEFAULT TRUE,
//!     "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! )
//! ```
//!
//! Schema names are derived once, at onboarding, and re-validated as
//! identifiers on every read.

use async_trait::async_trait;
use deadpool_postgres::Object;
use lexdata_core::config::TenancyConfig;
use lexdata_core::{DataError, DataResult, Identifier, SchemaNaming, Tenant, TenantId, TenantResolver};
use tokio_postgres::Row;
use tracing::{debug, info};

use crate::error::{PgError, is_benign_ddl_race};
use crate::pool::PgPool;

/// Resolves tenants from the directory table and onboards new ones.
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
    schema: Identifier,
    table: Identifier,
    naming: SchemaNaming,
}

impl PgTenantDirectory {
    /// A directory at `public.tenants` with `tenant_` schemas.
    pub fn new(pool: PgPool) -> DataResult<Self> {
        Self::from_config(pool, &TenancyConfig::default())
    }

    /// A directory laid out by the `[tenancy]` section of `lexdata.toml`.
    pub fn from_config(pool: PgPool, config: &TenancyConfig) -> DataResult<Self> {
        Ok(Self {
            pool,
            schema: config.directory_schema()?,
            table: config.directory_table()?,
            naming: config.schema_naming()?,
        })
    }

    /// The schema naming used when onboarding.
    pub fn naming(&self) -> &SchemaNaming {
        &self.naming
    }

    fn qualified(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }

    /// Create the directory schema and table if absent.
    pub async fn ensure_directory(&self) -> DataResult<()> {
        let client = self.pool.get().await?;
        run_ddl(
            &client,
            &format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema.quoted()),
        )
        .await?;
        run_ddl(
            &client,
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (\n    \
                 \"id\" VARCHAR(255) PRIMARY KEY,\n    \
                 \"schema_name\" VARCHAR(63) NOT NULL UNIQUE,\n    \
                 \"is_active\" BOOLEAN NOT NULL DEFAULT TRUE,\n    \
                 \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()\n)",
                self.qualified()
            ),
        )
        .await?;
        debug!(directory = %self.qualified(), "Tenant directory ensured");
        Ok(())
    }

    /// Onboard a tenant: derive its schema, create the schema and record it.
    ///
    /// Registering an existing tenant is a no-op that returns the stored row,
    /// active flag included.
    pub async fn register_tenant(&self, tenant_id: &TenantId) -> DataResult<Tenant> {
        let schema = self.naming.schema_for(tenant_id)?;
        let client = self.pool.get().await?;

        run_ddl(&client, &format!("CREATE SCHEMA IF NOT EXISTS {}", schema.quoted())).await?;

        let sql = format!(
            "INSERT INTO {} (\"id\", \"schema_name\") VALUES ($1, $2) ON CONFLICT (\"id\") DO NOTHING",
            self.qualified()
        );
        let inserted = client
            .execute(sql.as_str(), &[&tenant_id.as_str(), &schema.as_str()])
            .await
            .map_err(|e| directory_error(e, tenant_id, &sql))?;

        let tenant = self
            .fetch(&client, tenant_id)
            .await?
            .ok_or_else(|| DataError::internal("registered tenant vanished from the directory"))?;

        if inserted > 0 {
            info!(tenant = %tenant_id, schema = %tenant.schema, "Tenant registered");
        }
        Ok(tenant)
    }

    /// Activate or deactivate a tenant. Returns false if it is unknown.
    pub async fn set_active(&self, tenant_id: &TenantId, active: bool) -> DataResult<bool> {
        let client = self.pool.get().await?;
        let sql = format!("UPDATE {} SET \"is_active\" = $2 WHERE \"id\" = $1", self.qualified());
        let updated = client
            .execute(sql.as_str(), &[&tenant_id.as_str(), &active])
            .await
            .map_err(|e| directory_error(e, tenant_id, &sql))?;
        info!(tenant = %tenant_id, active, found = updated > 0, "Tenant activation changed");
        Ok(updated > 0)
    }

    async fn fetch(&self, client: &Object, tenant_id: &TenantId) -> DataResult<Option<Tenant>> {
        let sql = format!(
            "SELECT \"id\", \"schema_name\", \"is_active\" FROM {} WHERE \"id\" = $1",
            self.qualified()
        );
        let row = client
            .query_opt(sql.as_str(), &[&tenant_id.as_str()])
            .await
            .map_err(|e| directory_error(e, tenant_id, &sql))?;
        row.map(|row| tenant_from_row(&row, tenant_id)).transpose()
    }
}

impl std::fmt::Debug for PgTenantDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTenantDirectory")
            .field("directory", &self.qualified())
            .field("naming", &self.naming)
            .finish()
    }
}

#[async_trait]
impl TenantResolver for PgTenantDirectory {
    async fn lookup(&self, tenant_id: &TenantId) -> DataResult<Option<Tenant>> {
        let client = self.pool.get().await?;
        self.fetch(&client, tenant_id).await
    }
}

fn tenant_from_row(row: &Row, tenant_id: &TenantId) -> DataResult<Tenant> {
    let decode = |e: tokio_postgres::Error| {
        DataError::decode(format!("tenant directory row: {}", e)).with_tenant(tenant_id.as_str())
    };
    let schema_name: String = row.try_get("schema_name").map_err(decode)?;
    let active: bool = row.try_get("is_active").map_err(decode)?;

    // A tampered row must not reach the identifier path.
    let schema = Identifier::new(schema_name).map_err(|e| e.with_tenant(tenant_id.as_str()))?;

    let tenant = Tenant::new(tenant_id.clone(), schema);
    Ok(if active { tenant } else { tenant.deactivated() })
}

fn directory_error(err: tokio_postgres::Error, tenant_id: &TenantId, sql: &str) -> DataError {
    DataError::from(PgError::from(err))
        .with_context("tenant directory")
        .with_tenant(tenant_id.as_str())
        .with_sql(sql)
}

async fn run_ddl(client: &Object, sql: &str) -> DataResult<()> {
    match client.batch_execute(sql).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let err = DataError::from(PgError::from(e)).with_sql(sql);
            if is_benign_ddl_race(&err) {
                debug!(sql, error = %err, "Absorbed concurrent directory DDL race");
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}
