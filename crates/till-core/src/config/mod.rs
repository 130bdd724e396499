//! Reconciliation settings.
//!
//! `SyncSettings` is passed explicitly to the engine and services; nothing in
//! the crate reads retry limits from global state.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

/// Default retry budget per queued operation.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

const MAX_RETRIES_UPPER_BOUND: u32 = 100;

/// What happens to an operation once its retry budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Leave the entry in the active queue, capped at `max_retries`, and
    /// report it on every drain until an operator requeues it.
    #[default]
    Retain,
    /// Move the entry to the dead-letter table.
    DeadLetter,
}

impl ExhaustedPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retain => "retain",
            Self::DeadLetter => "dead_letter",
        }
    }
}

impl fmt::Display for ExhaustedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExhaustedPolicy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "retain" => Ok(Self::Retain),
            "dead_letter" => Ok(Self::DeadLetter),
            other => Err(Error::Config(format!(
                "unknown exhausted policy '{other}' (expected retain or dead_letter)"
            ))),
        }
    }
}

/// Settings for the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub exhausted_policy: ExhaustedPolicy,
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            exhausted_policy: ExhaustedPolicy::default(),
        }
    }
}

impl SyncSettings {
    /// Read `TILL_SYNC_MAX_RETRIES` and `TILL_SYNC_EXHAUSTED_POLICY`.
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_retries = match normalize_text_option(lookup("TILL_SYNC_MAX_RETRIES")) {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                Error::Config(format!(
                    "TILL_SYNC_MAX_RETRIES must be an integer in [1, {MAX_RETRIES_UPPER_BOUND}]"
                ))
            })?,
            None => DEFAULT_MAX_RETRIES,
        };

        let exhausted_policy = normalize_text_option(lookup("TILL_SYNC_EXHAUSTED_POLICY"))
            .map(|raw| raw.parse::<ExhaustedPolicy>())
            .transpose()?
            .unwrap_or_default();

        let settings = Self {
            max_retries,
            exhausted_policy,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_RETRIES_UPPER_BOUND).contains(&self.max_retries) {
            return Err(Error::Config(format!(
                "max_retries must be in [1, {MAX_RETRIES_UPPER_BOUND}], got {}",
                self.max_retries
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_exhausted_policy(mut self, policy: ExhaustedPolicy) -> Self {
        self.exhausted_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let settings = SyncSettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.exhausted_policy, ExhaustedPolicy::Retain);
    }

    #[test]
    fn parses_overrides() {
        let settings = SyncSettings::from_lookup(lookup_from(&[
            ("TILL_SYNC_MAX_RETRIES", " 3 "),
            ("TILL_SYNC_EXHAUSTED_POLICY", "dead-letter"),
        ]))
        .unwrap();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.exhausted_policy, ExhaustedPolicy::DeadLetter);
    }

    #[test]
    fn rejects_out_of_range_retries() {
        let error =
            SyncSettings::from_lookup(lookup_from(&[("TILL_SYNC_MAX_RETRIES", "0")])).unwrap_err();
        assert!(error.to_string().contains("max_retries"));

        let error = SyncSettings::from_lookup(lookup_from(&[("TILL_SYNC_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(error.to_string().contains("TILL_SYNC_MAX_RETRIES"));
    }

    #[test]
    fn rejects_unknown_policy() {
        let error =
            SyncSettings::from_lookup(lookup_from(&[("TILL_SYNC_EXHAUSTED_POLICY", "drop")]))
                .unwrap_err();
        assert!(error.to_string().contains("drop"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let settings: SyncSettings =
            serde_json::from_str(r#"{"exhausted_policy":"dead_letter"}"#).unwrap();
        assert_eq!(settings.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(settings.exhausted_policy, ExhaustedPolicy::DeadLetter);
    }
}
