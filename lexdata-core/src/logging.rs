//! Logging bootstrap.
//!
//! The data layer logs through `tracing` with structured fields (`tenant`,
//! `schema`, `table`, `sql`, `elapsed_ms`). Applications that already install
//! a subscriber need nothing from this module. Others can call [`init`], which
//! is driven by the environment:
//!
//! - `LEXDATA_DEBUG=true|1|yes` - enable debug-level logging
//! - `LEXDATA_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `LEXDATA_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! [`init`] is a no-op unless the `tracing-subscriber` feature is enabled and
//! one of the first two variables is set.
//!
//! ```rust,no_run
//! lexdata_core::logging::init();
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Crates whose events the installed filter lets through.
#[cfg_attr(not(feature = "tracing-subscriber"), allow(dead_code))]
const TARGETS: &[&str] = &["lexdata", "lexdata_core", "lexdata_postgres"];

/// Check if debug logging is enabled via `LEXDATA_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("LEXDATA_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// The configured log level.
///
/// `LEXDATA_LOG_LEVEL` wins when valid; otherwise "debug" if `LEXDATA_DEBUG`
/// is set, else "warn".
pub fn log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("LEXDATA_LOG_LEVEL") {
        Ok(level) => parse_level(&level).unwrap_or(fallback),
        Err(_) => fallback,
    }
}

/// The configured log format: "json", "pretty" or "compact".
pub fn log_format() -> &'static str {
    env::var("LEXDATA_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

fn parse_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

#[cfg_attr(not(feature = "tracing-subscriber"), allow(dead_code))]
fn filter_directive(level: &str) -> String {
    TARGETS
        .iter()
        .map(|t| format!("{}={}", t, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install a global subscriber according to the environment.
///
/// Subsequent calls are no-ops.
pub fn init() {
    if !is_debug_enabled() && env::var("LEXDATA_LOG_LEVEL").is_err() {
        return;
    }
    install(log_level(), log_format());
}

/// Install a global subscriber at an explicit level, ignoring the environment
/// variables for the level. Subsequent calls (and calls after [`init`]) are no-ops.
pub fn init_with_level(level: &str) {
    install(parse_level(level).unwrap_or("warn"), log_format());
}

#[allow(unused_variables)]
fn install(level: &'static str, format: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(filter_directive(level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);

            // Another subscriber may already be installed; keep it.
            let installed = match format {
                "pretty" => registry.with(fmt::layer().pretty()).try_init().is_ok(),
                "compact" => registry.with(fmt::layer().compact()).try_init().is_ok(),
                _ => registry.with(fmt::layer().json()).try_init().is_ok(),
            };

            if installed {
                tracing::info!(level, format, "lexdata logging initialized");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some("debug"));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(
            filter_directive("info"),
            "lexdata=info,lexdata_core=info,lexdata_postgres=info"
        );
    }
}
