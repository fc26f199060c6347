//! Schema-qualified statement execution.
//!
//! Every statement is rendered for exactly one tenant schema, prepared through
//! the connection's statement cache, bound with parameters encoded for the
//! types the server inferred, and raced against the request's deadline and
//! cancellation signal. When the request gives up first, the in-flight
//! statement is cancelled on the server.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_postgres::{ClientWrapper, Transaction};
use lexdata_core::config::DebugConfig;
use lexdata_core::{DataError, DataResult, RequestScope, Statement, Tenant, Value};
use serde::de::DeserializeOwned;
use tokio_postgres::{CancelToken, NoTls, Row};
use tracing::{debug, warn};

use crate::error::PgError;
use crate::row::{PgRow, decode_all};
use crate::types;

/// Statement logging and timeout settings shared by every tenant context.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySettings {
    /// Log every statement at debug level.
    pub log_queries: bool,
    /// Statements slower than this are logged at warn level.
    pub slow_query_threshold: Duration,
    /// Deadline applied when the request sets none.
    pub statement_timeout: Option<Duration>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            log_queries: false,
            slow_query_threshold: Duration::from_secs(1),
            statement_timeout: None,
        }
    }
}

impl QuerySettings {
    /// Build settings from the `[debug]` section of `lexdata.toml`.
    pub fn from_config(config: &DebugConfig) -> DataResult<Self> {
        Ok(Self {
            log_queries: config.log_queries,
            slow_query_threshold: config.slow_query_threshold(),
            statement_timeout: config.statement_timeout()?,
        })
    }
}

/// Something that runs statements against one tenant's schema.
///
/// Implemented by [`TenantContext`](crate::TenantContext) and
/// [`TenantTransaction`](crate::TenantTransaction), so the CRUD helpers work
/// the same inside and outside a transaction.
#[async_trait]
pub trait TenantSession: Send + Sync {
    /// The tenant every statement is routed to.
    fn tenant(&self) -> &Tenant;

    /// Run a statement and return its rows.
    async fn fetch(&self, statement: &Statement) -> DataResult<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    async fn execute_statement(&self, statement: &Statement) -> DataResult<u64>;

    /// Run SQL without parameters through the simple query protocol.
    ///
    /// Used for DDL; `sql` must already be rendered for this tenant.
    async fn batch_execute(&self, sql: &str) -> DataResult<()>;

    /// Run a `${schema}` template and decode every row into `T`.
    async fn query<T>(&self, template: &str, params: Vec<Value>) -> DataResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let statement = Statement::new(template, params)?;
        self.fetch_as(&statement).await
    }

    /// Run a `${schema}` template and return the affected row count.
    async fn execute(&self, template: &str, params: Vec<Value>) -> DataResult<u64> {
        let statement = Statement::new(template, params)?;
        self.execute_statement(&statement).await
    }

    /// Run a statement and decode every row into `T`.
    async fn fetch_as<T>(&self, statement: &Statement) -> DataResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let rows = self.fetch(statement).await?;
        decode_all(&rows)
    }

    /// Run a statement and decode the first row, if any, into `T`.
    async fn fetch_optional<T>(&self, statement: &Statement) -> DataResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let rows = self.fetch(statement).await?;
        rows.first().map(|row| row.decode::<T>()).transpose()
    }
}

/// A borrowed connection: a pooled client or an open transaction.
pub(crate) enum Conn<'a> {
    Client(&'a ClientWrapper),
    Transaction(&'a Transaction<'a>),
}

impl Conn<'_> {
    async fn prepare(&self, sql: &str) -> Result<tokio_postgres::Statement, tokio_postgres::Error> {
        match self {
            Self::Client(c) => c.prepare_cached(sql).await,
            Self::Transaction(t) => t.prepare_cached(sql).await,
        }
    }

    async fn query(
        &self,
        statement: &tokio_postgres::Statement,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        match self {
            Self::Client(c) => c.query(statement, params).await,
            Self::Transaction(t) => t.query(statement, params).await,
        }
    }

    async fn execute(
        &self,
        statement: &tokio_postgres::Statement,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<u64, tokio_postgres::Error> {
        match self {
            Self::Client(c) => c.execute(statement, params).await,
            Self::Transaction(t) => t.execute(statement, params).await,
        }
    }

    async fn batch_execute(&self, sql: &str) -> Result<(), tokio_postgres::Error> {
        match self {
            Self::Client(c) => c.batch_execute(sql).await,
            Self::Transaction(t) => t.batch_execute(sql).await,
        }
    }
}

/// Runs statements for one tenant on one connection.
pub(crate) struct Executor<'a> {
    pub(crate) conn: Conn<'a>,
    pub(crate) cancel: &'a CancelToken,
    pub(crate) tenant: &'a Tenant,
    pub(crate) scope: &'a RequestScope,
    pub(crate) settings: &'a QuerySettings,
}

impl Executor<'_> {
    pub(crate) async fn fetch(&self, statement: &Statement) -> DataResult<Vec<Row>> {
        let sql = statement.render(&self.tenant.schema);
        self.guard(&sql, async {
            let prepared = self.conn.prepare(&sql).await.map_err(PgError::from)?;
            let params = types::bind(statement.params(), prepared.params())?;
            let rows = self
                .conn
                .query(&prepared, &types::as_refs(&params))
                .await
                .map_err(PgError::from)?;
            Ok::<_, DataError>(rows)
        })
        .await
    }

    pub(crate) async fn execute(&self, statement: &Statement) -> DataResult<u64> {
        let sql = statement.render(&self.tenant.schema);
        self.guard(&sql, async {
            let prepared = self.conn.prepare(&sql).await.map_err(PgError::from)?;
            let params = types::bind(statement.params(), prepared.params())?;
            let count = self
                .conn
                .execute(&prepared, &types::as_refs(&params))
                .await
                .map_err(PgError::from)?;
            Ok::<_, DataError>(count)
        })
        .await
    }

    pub(crate) async fn batch_execute(&self, sql: &str) -> DataResult<()> {
        self.guard(sql, async {
            self.conn.batch_execute(sql).await.map_err(PgError::from)?;
            Ok::<_, DataError>(())
        })
        .await
    }

    async fn guard<T, F>(&self, sql: &str, work: F) -> DataResult<T>
    where
        F: Future<Output = DataResult<T>>,
    {
        let tenant = self.tenant.id.as_str();
        self.scope
            .check()
            .map_err(|e| e.with_tenant(tenant).with_sql(sql))?;

        let started = Instant::now();
        let result = tokio::select! {
            result = work => result,
            abandoned = self.scope.abandoned() => {
                if let Err(e) = self.cancel.cancel_query(NoTls).await {
                    warn!(tenant, error = %e, "Failed to send cancel request");
                }
                Err(abandoned)
            }
        };
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        let schema = self.tenant.schema.as_str();

        if elapsed >= self.settings.slow_query_threshold {
            warn!(tenant, schema, sql, elapsed_ms, "Slow query");
        } else if self.settings.log_queries {
            debug!(tenant, schema, sql, elapsed_ms, "Executed statement");
        }

        result.map_err(|e| {
            debug!(tenant, schema, sql, error = %e, "Statement failed");
            e.with_tenant(tenant).with_sql(sql)
        })
    }
}
