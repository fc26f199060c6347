//! Tenant-bound connections and transactions.

use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{Object, Transaction};
use lexdata_core::{DataError, DataResult, Identifier, RequestScope, Statement, Tenant};
use tokio_postgres::{CancelToken, Row};
use tracing::debug;

use crate::error::PgError;
use crate::executor::{Conn, Executor, QuerySettings, TenantSession};

/// A resolved tenant holding one pooled connection for the life of a request.
///
/// Every statement run through the context is rendered for the tenant's
/// schema and nothing else. The connection goes back to the pool when the
/// context is dropped, whichever way the request ends.
pub struct TenantContext {
    tenant: Tenant,
    client: Object,
    cancel: CancelToken,
    scope: RequestScope,
    settings: Arc<QuerySettings>,
}

impl TenantContext {
    pub(crate) fn new(
        tenant: Tenant,
        client: Object,
        scope: RequestScope,
        settings: Arc<QuerySettings>,
    ) -> Self {
        let cancel = client.cancel_token();
        let scope = scope.or_timeout(settings.statement_timeout);
        Self {
            tenant,
            client,
            cancel,
            scope,
            settings,
        }
    }

    /// The tenant's schema.
    pub fn schema(&self) -> &Identifier {
        &self.tenant.schema
    }

    /// The request's deadline and cancellation signal.
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Begin a transaction on this context's connection.
    ///
    /// The transaction rolls back unless [`TenantTransaction::commit`] is
    /// called, including when it is dropped on an error or cancellation path.
    pub async fn transaction(&mut self) -> DataResult<TenantTransaction<'_>> {
        self.scope.check()?;
        debug!(tenant = %self.tenant.id, "Beginning transaction");
        let txn = self.client.transaction().await.map_err(|e| {
            DataError::transaction(format!("cannot begin: {}", e))
                .with_tenant(self.tenant.id.as_str())
                .with_source(e)
        })?;
        Ok(TenantTransaction {
            txn,
            tenant: &self.tenant,
            cancel: &self.cancel,
            scope: &self.scope,
            settings: &self.settings,
        })
    }

    fn executor(&self) -> Executor<'_> {
        Executor {
            conn: Conn::Client(&self.client),
            cancel: &self.cancel,
            tenant: &self.tenant,
            scope: &self.scope,
            settings: &self.settings,
        }
    }
}

impl std::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant", &self.tenant)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TenantSession for TenantContext {
    fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    async fn fetch(&self, statement: &Statement) -> DataResult<Vec<Row>> {
        self.executor().fetch(statement).await
    }

    async fn execute_statement(&self, statement: &Statement) -> DataResult<u64> {
        self.executor().execute(statement).await
    }

    async fn batch_execute(&self, sql: &str) -> DataResult<()> {
        self.executor().batch_execute(sql).await
    }
}

/// An open transaction on a [`TenantContext`].
///
/// Statements run in submission order on the context's connection.
pub struct TenantTransaction<'c> {
    txn: Transaction<'c>,
    tenant: &'c Tenant,
    cancel: &'c CancelToken,
    scope: &'c RequestScope,
    settings: &'c QuerySettings,
}

impl TenantTransaction<'_> {
    /// Commit the transaction.
    pub async fn commit(self) -> DataResult<()> {
        debug!(tenant = %self.tenant.id, "Committing transaction");
        let tenant = self.tenant.id.as_str();
        self.txn
            .commit()
            .await
            .map_err(|e| DataError::from(PgError::from(e)).with_tenant(tenant))
    }

    /// Roll the transaction back.
    pub async fn rollback(self) -> DataResult<()> {
        debug!(tenant = %self.tenant.id, "Rolling back transaction");
        let tenant = self.tenant.id.as_str();
        self.txn
            .rollback()
            .await
            .map_err(|e| DataError::from(PgError::from(e)).with_tenant(tenant))
    }

    fn executor(&self) -> Executor<'_> {
        Executor {
            conn: Conn::Transaction(&self.txn),
            cancel: self.cancel,
            tenant: self.tenant,
            scope: self.scope,
            settings: self.settings,
        }
    }
}

#[async_trait]
impl<'c> TenantSession for TenantTransaction<'c> {
    fn tenant(&self) -> &Tenant {
        self.tenant
    }

    async fn fetch(&self, statement: &Statement) -> DataResult<Vec<Row>> {
        self.executor().fetch(statement).await
    }

    async fn execute_statement(&self, statement: &Statement) -> DataResult<u64> {
        self.executor().execute(statement).await
    }

    async fn batch_execute(&self, sql: &str) -> DataResult<()> {
        self.executor().batch_execute(sql).await
    }
}
