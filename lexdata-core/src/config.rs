//! Configuration file parsing for `lexdata.toml`.
//!
//! ```toml
//! [database]
//! url = "${DATABASE_URL}"
//!
//! [database.pool]
//! max_connections = 20
//! connect_timeout = "5s"
//!
//! [tenancy]
//! schema_prefix = "tenant_"
//!
//! [debug]
//! slow_query_threshold = 250
//! statement_timeout = "30s"
//!
//! [environments.test.database]
//! url = "postgres://localhost/lexdata_test"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::ident::Identifier;
use crate::tenant::SchemaNaming;

/// Main configuration structure for `lexdata.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LexdataConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Tenant naming and directory settings.
    #[serde(default)]
    pub tenancy: TenancyConfig,

    /// Provisioning settings.
    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl LexdataConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> DataResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataError::config(format!("cannot read {}: {}", path.display(), e)).with_source(e)
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string, expanding `${ENV_VAR}` references.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> DataResult<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)
            .map_err(|e| DataError::config(e.to_string()).with_source(e))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the database URL.
    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref()
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(db) = overrides.database {
                if let Some(url) = db.url {
                    self.database.url = Some(url);
                }
                if let Some(pool) = db.pool {
                    self.database.pool = pool;
                }
            }
            if let Some(debug) = overrides.debug {
                if let Some(log_queries) = debug.log_queries {
                    self.debug.log_queries = log_queries;
                }
                if let Some(threshold) = debug.slow_query_threshold {
                    self.debug.slow_query_threshold = threshold;
                }
                if let Some(timeout) = debug.statement_timeout {
                    self.debug.statement_timeout = Some(timeout);
                }
            }
        }
        self
    }

    /// Check values that serde cannot: durations, identifiers, pool bounds.
    pub fn validate(&self) -> DataResult<()> {
        let pool = &self.database.pool;
        if pool.max_connections == 0 {
            return Err(DataError::config("database.pool.max_connections must be at least 1"));
        }
        if pool.min_connections > pool.max_connections {
            return Err(DataError::config(
                "database.pool.min_connections exceeds max_connections",
            ));
        }
        pool.connect_timeout()?;
        pool.idle_timeout()?;
        pool.max_lifetime()?;
        self.debug.statement_timeout()?;
        self.tenancy.schema_naming()?;
        self.tenancy.directory_schema()?;
        self.tenancy.directory_table()?;
        self.tenancy.cache_ttl()?;
        Ok(())
    }
}

/// Database configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL (supports `${ENV_VAR}` interpolation).
    pub url: Option<String>,

    /// Connection pool settings.
    #[serde(default)]
    pub pool: PoolSettings,
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSettings {
    /// Minimum number of connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Maximum number of connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout for acquiring a connection, e.g. "30s".
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,

    /// Idle connection timeout, e.g. "10m".
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: String,

    /// Maximum connection lifetime, e.g. "30m".
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connect_timeout: default_connect_timeout(),
            idle_timeout: default_idle_timeout(),
            max_lifetime: default_max_lifetime(),
        }
    }
}

impl PoolSettings {
    /// Parsed connect timeout.
    pub fn connect_timeout(&self) -> DataResult<Duration> {
        parse_duration(&self.connect_timeout)
    }

    /// Parsed idle timeout.
    pub fn idle_timeout(&self) -> DataResult<Duration> {
        parse_duration(&self.idle_timeout)
    }

    /// Parsed maximum lifetime.
    pub fn max_lifetime(&self) -> DataResult<Duration> {
        parse_duration(&self.max_lifetime)
    }
}

fn default_min_connections() -> u32 { 2 }
fn default_max_connections() -> u32 { 10 }
fn default_connect_timeout() -> String { "30s".to_string() }
fn default_idle_timeout() -> String { "10m".to_string() }
fn default_max_lifetime() -> String { "30m".to_string() }

/// Tenant naming and directory settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TenancyConfig {
    /// Prefix of every tenant schema.
    #[serde(default = "default_schema_prefix")]
    pub schema_prefix: String,

    /// Schema holding the tenant directory table.
    #[serde(default = "default_directory_schema")]
    pub directory_schema: String,

    /// Tenant directory table.
    #[serde(default = "default_directory_table")]
    pub directory_table: String,

    /// How long resolved tenants are cached, e.g. "5m". "0s" disables the cache.
    ///
    /// Activation changes invalidate the cache only in the process that made
    /// them. Other processes keep serving a deactivated tenant until their
    /// entry expires, so this is also the longest delay before
    /// `TenantInactive` takes effect fleet-wide.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            schema_prefix: default_schema_prefix(),
            directory_schema: default_directory_schema(),
            directory_table: default_directory_table(),
            cache_ttl: default_cache_ttl(),
        }
    }
}

impl TenancyConfig {
    /// Naming scheme for tenant schemas.
    pub fn schema_naming(&self) -> DataResult<SchemaNaming> {
        SchemaNaming::with_prefix(&self.schema_prefix)
    }

    /// Validated directory schema.
    pub fn directory_schema(&self) -> DataResult<Identifier> {
        Identifier::new(&self.directory_schema)
            .map_err(|e| DataError::config(format!("tenancy.directory_schema: {}", e.message)))
    }

    /// Validated directory table.
    pub fn directory_table(&self) -> DataResult<Identifier> {
        Identifier::new(&self.directory_table)
            .map_err(|e| DataError::config(format!("tenancy.directory_table: {}", e.message)))
    }

    /// Parsed resolver cache TTL.
    pub fn cache_ttl(&self) -> DataResult<Duration> {
        parse_duration(&self.cache_ttl)
    }
}

fn default_schema_prefix() -> String { "tenant_".to_string() }
fn default_directory_schema() -> String { "public".to_string() }
fn default_directory_table() -> String { "tenants".to_string() }
fn default_cache_ttl() -> String { "5m".to_string() }

/// Provisioning settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisioningConfig {
    /// Remember ensured tables per process and skip repeat DDL.
    #[serde(default = "default_true")]
    pub cache_ensured: bool,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self { cache_ensured: true }
    }
}

fn default_true() -> bool { true }

/// Debug/logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log every statement at debug level.
    #[serde(default)]
    pub log_queries: bool,

    /// Slow query threshold in milliseconds.
    #[serde(default = "default_slow_query_threshold")]
    pub slow_query_threshold: u64,

    /// Deadline applied to every statement when the request sets none, e.g. "30s".
    #[serde(default)]
    pub statement_timeout: Option<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_queries: false,
            slow_query_threshold: default_slow_query_threshold(),
            statement_timeout: None,
        }
    }
}

impl DebugConfig {
    /// Slow query threshold.
    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_threshold)
    }

    /// Parsed default statement timeout.
    pub fn statement_timeout(&self) -> DataResult<Option<Duration>> {
        self.statement_timeout.as_deref().map(parse_duration).transpose()
    }
}

fn default_slow_query_threshold() -> u64 { 1000 }

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Database overrides.
    pub database: Option<DatabaseOverride>,

    /// Debug overrides.
    pub debug: Option<DebugOverride>,
}

/// Database configuration overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOverride {
    /// Override connection URL.
    pub url: Option<String>,

    /// Override pool settings.
    pub pool: Option<PoolSettings>,
}

/// Debug configuration overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugOverride {
    /// Override log_queries.
    pub log_queries: Option<bool>,

    /// Override slow_query_threshold.
    pub slow_query_threshold: Option<u64>,

    /// Override statement_timeout.
    pub statement_timeout: Option<String>,
}

/// Parse a duration such as "500ms", "30s", "10m" or "1h". A bare number is seconds.
pub fn parse_duration(input: &str) -> DataResult<Duration> {
    let s = input.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| DataError::config(format!("invalid duration '{}'", input)))?;

    let scaled = |factor: u64| {
        amount
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| DataError::config(format!("duration '{}' is out of range", input)))
    };
    match unit.trim() {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => scaled(60),
        "h" => scaled(3600),
        other => Err(DataError::config(format!(
            "invalid duration unit '{}' in '{}' (use ms, s, m or h)",
            other, input
        ))),
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
///
/// Unset variables are left as written.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}") else {
        return content.to_string();
    };
    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = LexdataConfig::default();
        assert_eq!(config.tenancy.schema_prefix, "tenant_");
        assert_eq!(config.tenancy.directory_table, "tenants");
        assert!(config.provisioning.cache_ensured);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [database]
            url = "postgres://localhost/lexdata"

            [database.pool]
            max_connections = 20
            connect_timeout = "5s"

            [debug]
            slow_query_threshold = 250
            statement_timeout = "2s"
        "#;

        let config = LexdataConfig::from_str(toml).unwrap();
        assert_eq!(config.database_url(), Some("postgres://localhost/lexdata"));
        assert_eq!(config.database.pool.max_connections, 20);
        assert_eq!(config.database.pool.min_connections, 2);
        assert_eq!(config.database.pool.connect_timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(config.debug.statement_timeout().unwrap(), Some(Duration::from_secs(2)));
        assert_eq!(config.debug.slow_query_threshold(), Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(LexdataConfig::from_str("[database]\nprovider = \"mysql\"").is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(LexdataConfig::from_str("[database.pool]\nmax_connections = 0").is_err());
        assert!(LexdataConfig::from_str("[database.pool]\nconnect_timeout = \"soon\"").is_err());
        assert!(LexdataConfig::from_str("[tenancy]\nschema_prefix = \"Tenant-\"").is_err());
        assert!(LexdataConfig::from_str("[tenancy]\ndirectory_table = \"a.b\"").is_err());
    }

    #[test]
    fn test_environment_override() {
        let toml = r#"
            [database]
            url = "postgres://prod/lexdata"

            [environments.test.database]
            url = "postgres://localhost/lexdata_test"

            [environments.test.debug]
            log_queries = true
        "#;

        let config = LexdataConfig::from_str(toml).unwrap().with_environment("test");
        assert_eq!(config.database_url(), Some("postgres://localhost/lexdata_test"));
        assert!(config.debug.log_queries);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3d").is_err());
    }

    #[test]
    fn test_parse_duration_out_of_range() {
        let err = parse_duration("99999999999999999h").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::InvalidConfiguration);
        assert!(parse_duration("999999999999999999m").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: the variable name is unique to this test.
        unsafe {
            std::env::set_var("LEXDATA_CONFIG_TEST_URL", "postgres://test");
        }
        let expanded = expand_env_vars("url = \"${LEXDATA_CONFIG_TEST_URL}\" other = \"${LEXDATA_UNSET_VAR_X}\"");
        assert_eq!(
            expanded,
            "url = \"postgres://test\" other = \"${LEXDATA_UNSET_VAR_X}\""
        );
        unsafe {
            std::env::remove_var("LEXDATA_CONFIG_TEST_URL");
        }
    }
}
