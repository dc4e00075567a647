// crates/trustwatch-config/src/lib.rs
// ============================================================================
// Module: Runtime Configuration
// Description: Environment-variable configuration loading for every role
//              (API, scheduler, crawl worker, evidence worker), validated
//              eagerly at process start.
// Purpose: No role reads `std::env` directly past startup; config is loaded
//          once and passed by value/Arc into each role's constructor.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! There is no global singleton config. [`EngineConfig::from_env`] is called
//! once in each binary's `main`, validated, and then threaded through
//! explicitly. Every field has a typed default so an unset environment is a
//! usable demo configuration.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// The environment variable name.
        var: &'static str,
        /// The raw string value that failed to parse.
        value: String,
    },
    /// A parsed value violated a validation rule.
    #[error("{var} must {rule}, got {value}")]
    OutOfRange {
        /// The environment variable name.
        var: &'static str,
        /// The rule that was violated.
        rule: &'static str,
        /// The value that violated it.
        value: String,
    },
}

/// Full engine configuration, assembled once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Interval between scheduler ticks.
    pub crawl_schedule: Duration,
    /// When true, adapters use their in-process demo implementations instead
    /// of real network/PDF/mail I/O.
    pub demo_mode: bool,
    /// Number of crawl jobs the crawl worker processes concurrently.
    pub crawl_worker_concurrency: u32,
    /// Number of evidence jobs the evidence worker processes concurrently.
    pub evidence_worker_concurrency: u32,
    /// Per-fetch timeout.
    pub fetch_timeout: Duration,
    /// Per-PDF-parse timeout.
    pub pdf_parse_timeout: Duration,
    /// TTL applied to the scheduler's single-leader lock.
    pub scheduler_lock_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: "trustwatch.db".to_string(),
            crawl_schedule: Duration::from_secs(3600),
            demo_mode: true,
            crawl_worker_concurrency: 4,
            evidence_worker_concurrency: 2,
            fetch_timeout: Duration::from_secs(20),
            pdf_parse_timeout: Duration::from_secs(30),
            scheduler_lock_ttl: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the process environment, falling back to
    /// [`EngineConfig::default`] field-by-field for anything unset.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a set variable fails to parse or
    /// violates a validation rule.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            database_path: env_string("DATABASE_PATH", defaults.database_path),
            crawl_schedule: env_duration_secs("CRAWL_SCHEDULE_SECS", defaults.crawl_schedule)?,
            demo_mode: env_bool("DEMO_MODE", defaults.demo_mode)?,
            crawl_worker_concurrency: env_u32("CRAWL_WORKER_CONCURRENCY", defaults.crawl_worker_concurrency)?,
            evidence_worker_concurrency: env_u32(
                "EVIDENCE_WORKER_CONCURRENCY",
                defaults.evidence_worker_concurrency,
            )?,
            fetch_timeout: env_duration_secs("FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            pdf_parse_timeout: env_duration_secs("PDF_PARSE_TIMEOUT_SECS", defaults.pdf_parse_timeout)?,
            scheduler_lock_ttl: env_duration_secs("SCHEDULER_LOCK_TTL_SECS", defaults.scheduler_lock_ttl)?,
        };
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::OutOfRange {
                var: "DATABASE_PATH",
                rule: "be non-empty",
                value: self.database_path,
            });
        }
        if self.crawl_worker_concurrency == 0 {
            return Err(ConfigError::OutOfRange {
                var: "CRAWL_WORKER_CONCURRENCY",
                rule: "be at least 1",
                value: "0".to_string(),
            });
        }
        if self.evidence_worker_concurrency == 0 {
            return Err(ConfigError::OutOfRange {
                var: "EVIDENCE_WORKER_CONCURRENCY",
                rule: "be at least 1",
                value: "0".to_string(),
            });
        }
        if self.crawl_schedule.is_zero() {
            return Err(ConfigError::OutOfRange {
                var: "CRAWL_SCHEDULE_SECS",
                rule: "be at least 1 second",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }
}

fn env_string(var: &'static str, default: String) -> String {
    std::env::var(var).unwrap_or(default)
}

fn env_bool(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { var, value: raw }),
        },
    }
}

fn env_u32(var: &'static str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}

fn env_duration_secs(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::EngineConfig;

    // Environment variable mutation is process-global; serialize these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for var in [
            "DATABASE_PATH",
            "CRAWL_SCHEDULE_SECS",
            "DEMO_MODE",
            "CRAWL_WORKER_CONCURRENCY",
            "EVIDENCE_WORKER_CONCURRENCY",
            "FETCH_TIMEOUT_SECS",
            "PDF_PARSE_TIMEOUT_SECS",
            "SCHEDULER_LOCK_TTL_SECS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn defaults_are_valid_with_empty_environment() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_all();
        let config = EngineConfig::from_env().expect("defaults must validate");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_all();
        std::env::set_var("CRAWL_WORKER_CONCURRENCY", "0");
        let result = EngineConfig::from_env();
        clear_all();
        assert!(result.is_err());
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_all();
        std::env::set_var("DEMO_MODE", "maybe");
        let result = EngineConfig::from_env();
        clear_all();
        assert!(result.is_err());
    }

    #[test]
    fn overrides_are_applied() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_all();
        std::env::set_var("DEMO_MODE", "false");
        std::env::set_var("CRAWL_WORKER_CONCURRENCY", "8");
        let config = EngineConfig::from_env().expect("valid overrides");
        clear_all();
        assert!(!config.demo_mode);
        assert_eq!(config.crawl_worker_concurrency, 8);
    }
}
