//! Tenant resolvers for looking up tenants by id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::context::{Tenant, TenantId};
use crate::error::{DataError, DataResult};

/// A source of tenant records.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// Look up a tenant, returning `None` if it does not exist.
    async fn lookup(&self, tenant_id: &TenantId) -> DataResult<Option<Tenant>>;

    /// Resolve a tenant that must exist and be active.
    async fn resolve(&self, tenant_id: &TenantId) -> DataResult<Tenant> {
        let tenant = self
            .lookup(tenant_id)
            .await?
            .ok_or_else(|| DataError::tenant_not_found(tenant_id.as_str()))?;

        if !tenant.active {
            return Err(DataError::tenant_inactive(tenant_id.as_str()));
        }
        Ok(tenant)
    }
}

#[async_trait]
impl<R: TenantResolver + ?Sized> TenantResolver for Arc<R> {
    async fn lookup(&self, tenant_id: &TenantId) -> DataResult<Option<Tenant>> {
        (**self).lookup(tenant_id).await
    }
}

/// An in-memory resolver, for tests and single-node tools.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    tenants: Arc<RwLock<HashMap<TenantId, Tenant>>>,
}

impl StaticResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a tenant.
    pub fn register(&self, tenant: Tenant) -> &Self {
        self.tenants.write().insert(tenant.id.clone(), tenant);
        self
    }

    /// Mark a tenant inactive. Returns false if it is unknown.
    pub fn deactivate(&self, tenant_id: &TenantId) -> bool {
        match self.tenants.write().get_mut(tenant_id) {
            Some(tenant) => {
                tenant.active = false;
                true
            }
            None => false,
        }
    }

    /// Number of registered tenants.
    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TenantResolver for StaticResolver {
    async fn lookup(&self, tenant_id: &TenantId) -> DataResult<Option<Tenant>> {
        Ok(self.tenants.read().get(tenant_id).cloned())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    tenant: Option<Tenant>,
    expires_at: Instant,
}

/// Wraps another resolver with a TTL cache.
///
/// Misses are cached for `negative_ttl` so unknown ids do not hammer the
/// directory. A deactivation becomes visible once the entry expires or is
/// invalidated.
pub struct CachingResolver<R> {
    inner: R,
    ttl: Duration,
    negative_ttl: Duration,
    entries: RwLock<HashMap<TenantId, CacheEntry>>,
}

impl<R: TenantResolver> CachingResolver<R> {
    /// Wrap a resolver with a 5 minute TTL and 1 minute negative TTL.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            ttl: Duration::from_secs(300),
            negative_ttl: Duration::from_secs(60),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Set the TTL for found tenants.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the TTL for misses.
    pub fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    /// Drop a cached entry.
    pub fn invalidate(&self, tenant_id: &TenantId) {
        self.entries.write().remove(tenant_id);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries, including expired ones not yet replaced.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> std::fmt::Debug for CachingResolver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingResolver")
            .field("ttl", &self.ttl)
            .field("negative_ttl", &self.negative_ttl)
            .field("cached", &self.entries.read().len())
            .finish()
    }
}

#[async_trait]
impl<R: TenantResolver> TenantResolver for CachingResolver<R> {
    async fn lookup(&self, tenant_id: &TenantId) -> DataResult<Option<Tenant>> {
        if let Some(entry) = self.entries.read().get(tenant_id) {
            if Instant::now() < entry.expires_at {
                debug!(tenant = %tenant_id, "Tenant cache hit");
                return Ok(entry.tenant.clone());
            }
        }

        let tenant = self.inner.lookup(tenant_id).await?;
        let ttl = if tenant.is_some() { self.ttl } else { self.negative_ttl };
        self.entries.write().insert(
            tenant_id.clone(),
            CacheEntry {
                tenant: tenant.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(tenant)
    }
}
