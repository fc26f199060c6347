//! The data core engine: one explicitly constructed instance per process.
//!
//! [`DataCore`] owns the connection pool, the tenant resolver, the table
//! registry and the provisioner. Domain services receive a reference at
//! startup and go through it for everything:
//!
//! ```rust,ignore
//! use lexdata_postgres::{DataCore, TenantSession};
//! use lexdata_core::{LexdataConfig, Record, catalog};
//!
//! let core = DataCore::connect(&LexdataConfig::from_file("lexdata.toml")?).await?;
//! let ctx = core.resolve_tenant("acme").await?;
//! core.ensure_table(&ctx, &catalog::estimate_items()?).await?;
//!
//! let item: serde_json::Value = core
//!     .insert(&ctx, "estimate_items", &Record::new()
//!         .set("estimate_id", "estimate_1")
//!         .set("user_id", "user_1")
//!         .set("description", "Consulta")
//!         .set("quantity", 2)
//!         .set("rate", 100))
//!     .await?;
//! ```

use std::sync::Arc;

use lexdata_core::crud::{self, ListQuery};
use lexdata_core::tenant::CachingResolver;
use lexdata_core::{
    DataError, DataResult, ImportPolicy, ImportReport, LexdataConfig, Page, Patch, Record,
    RequestScope, SchemaRegistry, TableSchema, Tenant, TenantId, TenantResolver, Value, catalog,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::PgConfig;
use crate::context::TenantContext;
use crate::directory::PgTenantDirectory;
use crate::error::PgError;
use crate::executor::{QuerySettings, TenantSession};
use crate::pool::{PgPool, PoolStatus};
use crate::provision::SchemaProvisioner;

type DirectoryCache = CachingResolver<Arc<PgTenantDirectory>>;

/// Tenant-scoped data access over a shared pool.
///
/// Cheap to clone; clones share the pool, registry and provisioning cache.
#[derive(Clone)]
pub struct DataCore {
    pool: PgPool,
    resolver: Arc<dyn TenantResolver>,
    directory: Option<Arc<PgTenantDirectory>>,
    cache: Option<Arc<DirectoryCache>>,
    registry: Arc<SchemaRegistry>,
    provisioner: Arc<SchemaProvisioner>,
    settings: Arc<QuerySettings>,
}

impl DataCore {
    /// Start up from `lexdata.toml` settings.
    ///
    /// Opens the pool, creates the tenant directory if needed, registers the
    /// application catalog and opens `min_connections` connections.
    pub async fn connect(config: &LexdataConfig) -> DataResult<Self> {
        config.validate()?;
        let (pg_config, pool_config) = PgConfig::from_lexdata(config)?;
        info!(url = %pg_config.redacted_url(), "Connecting data core");
        let pool = PgPool::with_pool_config(pg_config, pool_config)?;

        let directory = Arc::new(PgTenantDirectory::from_config(pool.clone(), &config.tenancy)?);
        directory.ensure_directory().await?;

        let ttl = config.tenancy.cache_ttl()?;
        let cache = if ttl.is_zero() {
            None
        } else {
            Some(Arc::new(CachingResolver::new(Arc::clone(&directory)).with_ttl(ttl)))
        };
        let resolver: Arc<dyn TenantResolver> = match &cache {
            Some(cache) => cache.clone(),
            None => directory.clone(),
        };

        pool.warm_up().await?;

        Ok(Self {
            pool,
            resolver,
            directory: Some(directory),
            cache,
            registry: Arc::new(catalog::registry()?),
            provisioner: Arc::new(SchemaProvisioner::from_config(&config.provisioning)),
            settings: Arc::new(QuerySettings::from_config(&config.debug)?),
        })
    }

    /// Build a core from an existing pool and resolver, with an empty
    /// registry and default settings.
    pub fn with_resolver(pool: PgPool, resolver: Arc<dyn TenantResolver>) -> Self {
        Self {
            pool,
            resolver,
            directory: None,
            cache: None,
            registry: Arc::new(SchemaRegistry::new()),
            provisioner: Arc::new(SchemaProvisioner::new()),
            settings: Arc::new(QuerySettings::default()),
        }
    }

    /// Replace the statement settings.
    pub fn with_settings(mut self, settings: QuerySettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Replace the provisioner.
    pub fn with_provisioner(mut self, provisioner: SchemaProvisioner) -> Self {
        self.provisioner = Arc::new(provisioner);
        self
    }

    /// Register a table definition.
    pub fn register(&self, table: TableSchema) -> Arc<TableSchema> {
        self.registry.register(table)
    }

    /// The table registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The provisioner.
    pub fn provisioner(&self) -> &SchemaProvisioner {
        &self.provisioner
    }

    /// The connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ============== Tenants ==============

    /// Resolve a tenant and bind it to a pooled connection.
    pub async fn resolve_tenant(&self, tenant_id: impl Into<TenantId>) -> DataResult<TenantContext> {
        self.resolve_tenant_with(tenant_id, RequestScope::new()).await
    }

    /// Resolve a tenant under a request deadline and cancellation signal.
    ///
    /// Fails with `TenantNotFound` or `TenantInactive` before any connection
    /// is taken from the pool.
    pub async fn resolve_tenant_with(
        &self,
        tenant_id: impl Into<TenantId>,
        scope: RequestScope,
    ) -> DataResult<TenantContext> {
        let tenant_id = tenant_id.into();
        let tenant = self.resolver.resolve(&tenant_id).await?;
        scope.check()?;

        let client = tokio::select! {
            client = self.pool.get() => client.map_err(|e| e.with_tenant(tenant_id.as_str()))?,
            abandoned = scope.abandoned() => {
                return Err(abandoned.with_tenant(tenant_id.as_str()));
            }
        };
        debug!(tenant = %tenant.id, schema = %tenant.schema, "Tenant context opened");
        Ok(TenantContext::new(tenant, client, scope, Arc::clone(&self.settings)))
    }

    /// Onboard a tenant in the directory.
    pub async fn register_tenant(&self, tenant_id: impl Into<TenantId>) -> DataResult<Tenant> {
        let tenant_id = tenant_id.into();
        let tenant = self.directory()?.register_tenant(&tenant_id).await?;
        self.invalidate(&tenant_id);
        Ok(tenant)
    }

    /// Activate or deactivate a tenant. Returns false if it is unknown.
    pub async fn set_tenant_active(&self, tenant_id: impl Into<TenantId>, active: bool) -> DataResult<bool> {
        let tenant_id = tenant_id.into();
        let found = self.directory()?.set_active(&tenant_id, active).await?;
        self.invalidate(&tenant_id);
        Ok(found)
    }

    fn directory(&self) -> DataResult<&PgTenantDirectory> {
        self.directory.as_deref().ok_or_else(|| {
            DataError::config("this data core has no tenant directory")
                .with_suggestion("Use DataCore::connect, or manage tenants through your own resolver")
        })
    }

    fn invalidate(&self, tenant_id: &TenantId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(tenant_id);
        }
    }

    // ============== Provisioning ==============

    /// Make sure `table` exists in the tenant's schema in its declared shape.
    ///
    /// The definition is registered first when its name is new or it differs
    /// from the registered one, so the CRUD helpers work from it afterwards.
    pub async fn ensure_table(&self, ctx: &TenantContext, table: &TableSchema) -> DataResult<()> {
        self.adopt(table);
        self.provisioner.ensure(ctx, table).await
    }

    fn adopt(&self, table: &TableSchema) {
        let known = self
            .registry
            .get(table.table())
            .is_ok_and(|registered| *registered == *table);
        if !known {
            self.registry.register(table.clone());
        }
    }

    /// [`ensure_table`](Self::ensure_table) for an already registered table.
    pub async fn ensure_registered(&self, ctx: &TenantContext, table: &str) -> DataResult<()> {
        let schema = self.registry.get(table)?;
        self.provisioner.ensure(ctx, &schema).await
    }

    // ============== Statements ==============

    /// Run a `${schema}` template and decode every row into `T`.
    pub async fn query<T, S>(&self, session: &S, template: &str, params: Vec<Value>) -> DataResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
        S: TenantSession,
    {
        session.query(template, params).await
    }

    /// Insert a record and return the stored row.
    pub async fn insert<T, S>(&self, session: &S, table: &str, record: &Record) -> DataResult<T>
    where
        T: DeserializeOwned + Send,
        S: TenantSession,
    {
        let schema = self.registry.get(table)?;
        let statement = crud::insert(&schema, record)?;
        session
            .fetch_optional::<T>(&statement)
            .await
            .map_err(|e| e.with_table(table))?
            .ok_or_else(|| DataError::internal("INSERT ... RETURNING produced no row").with_table(table))
    }

    /// Apply a patch to one owned, active row.
    ///
    /// Returns `None` when no row matched, whether the id is unknown or
    /// owned by someone else.
    pub async fn update<T, S>(
        &self,
        session: &S,
        table: &str,
        id: impl Into<Value>,
        owners: &Record,
        patch: &Patch,
    ) -> DataResult<Option<T>>
    where
        T: DeserializeOwned + Send,
        S: TenantSession,
    {
        let schema = self.registry.get(table)?;
        let statement = crud::update(&schema, &id.into(), owners, patch)?;
        session
            .fetch_optional::<T>(&statement)
            .await
            .map_err(|e| e.with_table(table))
    }

    /// Clear the active flag of one owned row. Returns whether a row matched.
    pub async fn soft_delete<S>(&self, session: &S, table: &str, id: impl Into<Value>, owners: &Record) -> DataResult<bool>
    where
        S: TenantSession,
    {
        let schema = self.registry.get(table)?;
        let statement = crud::soft_delete(&schema, &id.into(), owners)?;
        let affected = session
            .execute_statement(&statement)
            .await
            .map_err(|e| e.with_table(table))?;
        Ok(affected > 0)
    }

    /// Read one active row by id.
    pub async fn find_by_id<T, S>(
        &self,
        session: &S,
        table: &str,
        id: impl Into<Value>,
        owners: &Record,
    ) -> DataResult<Option<T>>
    where
        T: DeserializeOwned + Send,
        S: TenantSession,
    {
        self.find(session, table, id.into(), owners, false).await
    }

    /// Read one row by id, soft-deleted or not.
    pub async fn find_by_id_any<T, S>(
        &self,
        session: &S,
        table: &str,
        id: impl Into<Value>,
        owners: &Record,
    ) -> DataResult<Option<T>>
    where
        T: DeserializeOwned + Send,
        S: TenantSession,
    {
        self.find(session, table, id.into(), owners, true).await
    }

    async fn find<T, S>(
        &self,
        session: &S,
        table: &str,
        id: Value,
        owners: &Record,
        include_inactive: bool,
    ) -> DataResult<Option<T>>
    where
        T: DeserializeOwned + Send,
        S: TenantSession,
    {
        let schema = self.registry.get(table)?;
        let statement = crud::find_by_id(&schema, &id, owners, include_inactive)?;
        session
            .fetch_optional::<T>(&statement)
            .await
            .map_err(|e| e.with_table(table))
    }

    /// Read one page of rows plus the total match count.
    pub async fn list<T, S>(&self, session: &S, table: &str, query: &ListQuery) -> DataResult<Page<T>>
    where
        T: DeserializeOwned + Send,
        S: TenantSession,
    {
        let schema = self.registry.get(table)?;
        let statements = crud::list(&schema, query)?;

        let items = session
            .fetch_as::<T>(&statements.rows)
            .await
            .map_err(|e| e.with_table(table))?;
        let rows = session
            .fetch(&statements.count)
            .await
            .map_err(|e| e.with_table(table))?;
        let total: i64 = match rows.first() {
            Some(row) => row
                .try_get("total")
                .map_err(|e| DataError::decode(format!("row count: {}", e)).with_table(table))?,
            None => 0,
        };

        Ok(Page::new(items, total.max(0) as u64, query.pagination))
    }

    /// Insert records one by one, isolating failures per record.
    ///
    /// `policy` decides whether a failure stops the batch; the report lists
    /// every failed record with its position and key. Run imports on a
    /// [`TenantContext`], not inside a transaction: the first failure would
    /// abort the transaction and every later record with it.
    pub async fn import<S, I>(&self, session: &S, table: &str, records: I, policy: ImportPolicy) -> DataResult<ImportReport>
    where
        S: TenantSession,
        I: IntoIterator<Item = Record>,
    {
        let schema = self.registry.get(table)?;
        let tenant = session.tenant().id.as_str();
        let mut report = ImportReport::new();

        for (index, record) in records.into_iter().enumerate() {
            let result = match crud::insert(&schema, &record) {
                Ok(statement) => session.execute_statement(&statement).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(_) => report.record_success(),
                Err(error) => {
                    let key = record_key(&schema, &record);
                    debug!(tenant, table, index, key = ?key, error = %error, "Import record failed");
                    if !report.record_failure(policy, index, key, error.with_table(table)) {
                        warn!(tenant, table, index, "Import stopped by policy");
                        break;
                    }
                }
            }
        }

        info!(
            tenant,
            table,
            inserted = report.inserted,
            failed = report.failed(),
            aborted = report.aborted,
            "Import finished"
        );
        Ok(report)
    }

    // ============== Lifecycle ==============

    /// Check that a connection can be taken and used.
    pub async fn health_check(&self) -> DataResult<PoolStatus> {
        let client = self.pool.get().await?;
        client
            .batch_execute("SELECT 1")
            .await
            .map_err(|e| DataError::from(PgError::from(e)).with_context("health check"))?;
        Ok(self.pool.status())
    }

    /// Close the pool. Contexts already handed out keep their connection
    /// until dropped.
    pub fn shutdown(&self) {
        self.pool.close();
        info!("Data core shut down");
    }
}

impl std::fmt::Debug for DataCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCore")
            .field("tables", &self.registry.tables())
            .field("settings", &self.settings)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// The key reported for a failed import record: its primary key, else its
/// `external_id`.
fn record_key(table: &TableSchema, record: &Record) -> Option<String> {
    [table.primary_key(), "external_id"]
        .into_iter()
        .filter_map(|column| record.get(column))
        .find(|value| !value.is_null())
        .map(|value| match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_json().to_string(),
        })
}
