use std::collections::HashMap;
use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use till_core::SyncSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Sync(#[from] till_core::Error),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
    pub rate_limit_window: Duration,
    pub push_rate_limit_per_window: u32,
    pub sync: SyncSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TILL_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = PathBuf::from(value_or_default(&lookup, "TILL_DB_PATH", "till.db"));

        let request_timeout_secs =
            bounded(&lookup, "TILL_API_REQUEST_TIMEOUT_SECS", "15", 1..=300)?;
        let rate_limit_window_secs = bounded(&lookup, "RATE_LIMIT_WINDOW_SECS", "60", 10..=3_600)?;
        let push_rate_limit_per_window =
            bounded(&lookup, "PUSH_RATE_LIMIT_PER_WINDOW", "120", 1..=10_000)?;

        let sync = SyncSettings::from_lookup(&lookup)?;

        Ok(Self {
            bind_addr,
            db_path,
            request_timeout: Duration::from_secs(request_timeout_secs),
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            push_rate_limit_per_window,
            sync,
        })
    }
}

fn bounded<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
{
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = value_or_default(lookup, name, default)
        .parse::<T>()
        .map_err(|_| invalid())?;
    if !range.contains(&value) {
        return Err(invalid());
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
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

    use till_core::ExhaustedPolicy;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.db_path, PathBuf::from("till.db"));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.push_rate_limit_per_window, 120);
        assert_eq!(config.sync, SyncSettings::default());
    }

    #[test]
    fn config_reads_overrides() {
        let config = config_from(&[
            ("TILL_API_BIND_ADDR", " 0.0.0.0:9000 "),
            ("TILL_DB_PATH", "/var/lib/till/till.db"),
            ("TILL_API_REQUEST_TIMEOUT_SECS", "30"),
            ("TILL_SYNC_MAX_RETRIES", "8"),
            ("TILL_SYNC_EXHAUSTED_POLICY", "dead_letter"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.sync.max_retries, 8);
        assert_eq!(config.sync.exhausted_policy, ExhaustedPolicy::DeadLetter);
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        let err = config_from(&[("RATE_LIMIT_WINDOW_SECS", "5")]).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_WINDOW_SECS"));

        let err = config_from(&[("PUSH_RATE_LIMIT_PER_WINDOW", "many")]).unwrap_err();
        assert!(err.to_string().contains("PUSH_RATE_LIMIT_PER_WINDOW"));
    }

    #[test]
    fn config_surfaces_sync_settings_errors() {
        let err = config_from(&[("TILL_SYNC_MAX_RETRIES", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Sync(_)));
    }
}
