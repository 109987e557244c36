use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tally_core::EngineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub auth_clock_skew: Duration,
    pub engine: EngineConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("engine", &self.engine)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TALLY_API_BIND_ADDR", "127.0.0.1:8080");
        let database_path =
            PathBuf::from(value_or_default(&lookup, "TALLY_DATABASE_PATH", "tally.db"));

        let jwt_secret = required_trimmed(&lookup, "AUTH_JWT_SECRET")?;
        let jwt_issuer = optional_trimmed(&lookup, "AUTH_JWT_ISSUER");

        let auth_clock_skew_secs =
            bounded::<u64>(&lookup, "AUTH_CLOCK_SKEW_SECS", "60", 0, 300)?;
        let max_batch_operations =
            bounded::<usize>(&lookup, "SYNC_MAX_BATCH_OPERATIONS", "500", 1, 5_000)?;
        let pull_page_limit = bounded::<usize>(&lookup, "SYNC_PULL_PAGE_LIMIT", "1000", 1, 10_000)?;

        Ok(Self {
            bind_addr,
            database_path,
            jwt_secret,
            jwt_issuer,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            engine: EngineConfig {
                max_batch_operations,
                pull_page_limit,
            },
        })
    }
}

fn bounded<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + fmt::Display + Copy,
{
    let value = value_or_default(lookup, name, default)
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]")))?;
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_requires_jwt_secret() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("AUTH_JWT_SECRET"));
    }

    #[test]
    fn config_applies_defaults() {
        let config = load(&[("AUTH_JWT_SECRET", "secret")]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_path, PathBuf::from("tally.db"));
        assert_eq!(config.jwt_issuer, None);
        assert_eq!(config.auth_clock_skew, Duration::from_secs(60));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn config_rejects_out_of_range_limits() {
        let err = load(&[
            ("AUTH_JWT_SECRET", "secret"),
            ("SYNC_MAX_BATCH_OPERATIONS", "0"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("SYNC_MAX_BATCH_OPERATIONS"));

        let err = load(&[("AUTH_JWT_SECRET", "secret"), ("AUTH_CLOCK_SKEW_SECS", "soon")])
            .unwrap_err();
        assert!(err.to_string().contains("AUTH_CLOCK_SKEW_SECS"));
    }

    #[test]
    fn config_reads_engine_limits() {
        let config = load(&[
            ("AUTH_JWT_SECRET", "secret"),
            ("SYNC_MAX_BATCH_OPERATIONS", "50"),
            ("SYNC_PULL_PAGE_LIMIT", " 200 "),
        ])
        .unwrap();
        assert_eq!(config.engine.max_batch_operations, 50);
        assert_eq!(config.engine.pull_page_limit, 200);
    }

    #[test]
    fn config_redacts_sensitive_debug_fields() {
        let config = load(&[("AUTH_JWT_SECRET", "sensitive-signing-secret")]).unwrap();

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-signing-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
