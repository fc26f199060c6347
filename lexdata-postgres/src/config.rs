//! PostgreSQL connection configuration.

use std::time::Duration;

use lexdata_core::{DataResult, LexdataConfig};

use crate::error::{PgError, PgResult};
use crate::pool::PoolConfig;

/// Application name reported to the server unless the URL sets one.
pub const DEFAULT_APPLICATION_NAME: &str = "lexdata";

/// PostgreSQL connection configuration.
#[derive(Debug, Clone)]
pub struct PgConfig {
    /// Database URL.
    pub url: String,
    /// Host (extracted from URL or explicit).
    pub host: String,
    /// Port (default: 5432).
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Username.
    pub user: String,
    /// Password.
    pub password: Option<String>,
    /// SSL mode.
    pub ssl_mode: SslMode,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Server-side statement timeout, sent as the `statement_timeout` setting.
    pub statement_timeout: Option<Duration>,
    /// Application name (shown in pg_stat_activity).
    pub application_name: String,
}

/// SSL mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Disable SSL.
    Disable,
    /// Prefer SSL but allow non-SSL.
    #[default]
    Prefer,
    /// Require SSL.
    Require,
}

impl PgConfig {
    /// Create a new configuration from a database URL.
    pub fn from_url(url: impl Into<String>) -> PgResult<Self> {
        let url = url.into();
        let parsed = url::Url::parse(&url)
            .map_err(|e| PgError::config(format!("invalid database URL: {}", e)))?;

        if parsed.scheme() != "postgresql" && parsed.scheme() != "postgres" {
            return Err(PgError::config(format!(
                "invalid scheme: expected 'postgresql' or 'postgres', got '{}'",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| PgError::config("missing host in URL"))?
            .to_string();
        let port = parsed.port().unwrap_or(5432);

        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(PgError::config("missing database name in URL"));
        }

        let user = if parsed.username().is_empty() {
            "postgres".to_string()
        } else {
            parsed.username().to_string()
        };
        let password = parsed.password().map(String::from);

        let mut config = Self {
            url: url.clone(),
            host,
            port,
            database,
            user,
            password,
            ssl_mode: SslMode::Prefer,
            connect_timeout: Duration::from_secs(30),
            statement_timeout: None,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        };

        for (key, value) in parsed.query_pairs() {
            match &*key {
                "sslmode" => {
                    config.ssl_mode = match &*value {
                        "disable" => SslMode::Disable,
                        "prefer" => SslMode::Prefer,
                        "require" => SslMode::Require,
                        other => {
                            return Err(PgError::config(format!("invalid sslmode: {}", other)));
                        }
                    };
                }
                "connect_timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| PgError::config("invalid connect_timeout"))?;
                    config.connect_timeout = Duration::from_secs(secs);
                }
                "statement_timeout" => {
                    let ms: u64 = value
                        .parse()
                        .map_err(|_| PgError::config("invalid statement_timeout"))?;
                    config.statement_timeout = Some(Duration::from_millis(ms));
                }
                "application_name" => config.application_name = value.into_owned(),
                other => {
                    return Err(PgError::config(format!("unsupported URL parameter: {}", other)));
                }
            }
        }

        Ok(config)
    }

    /// Build the connection and pool configuration from `lexdata.toml`.
    pub fn from_lexdata(config: &LexdataConfig) -> DataResult<(Self, PoolConfig)> {
        let url = config
            .database_url()
            .ok_or_else(|| PgError::config("database.url is not set"))?;
        let mut pg = Self::from_url(url)?;

        let pool = &config.database.pool;
        pg.connect_timeout = pool.connect_timeout()?;

        let pool_config = PoolConfig {
            max_connections: pool.max_connections as usize,
            min_connections: pool.min_connections as usize,
            connection_timeout: Some(pool.connect_timeout()?),
            idle_timeout: Some(pool.idle_timeout()?),
            max_lifetime: Some(pool.max_lifetime()?),
        };
        Ok((pg, pool_config))
    }

    /// Convert to tokio-postgres config.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.dbname(&self.database);
        config.user(&self.user);

        if let Some(ref password) = self.password {
            config.password(password);
        }

        config.application_name(&self.application_name);
        config.connect_timeout(self.connect_timeout);
        config.ssl_mode(match self.ssl_mode {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require => tokio_postgres::config::SslMode::Require,
        });

        if let Some(timeout) = self.statement_timeout {
            config.options(&format!("-c statement_timeout={}", timeout.as_millis()));
        }

        config
    }

    /// The URL with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => self.url.replacen(password.as_str(), "***", 1),
            _ => self.url.clone(),
        }
    }
}
