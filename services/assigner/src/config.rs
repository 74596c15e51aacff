use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::allocation::{RetryPolicy, ScoreWeights};
use crate::db::DbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub database: DbConfig,
    pub weights: ScoreWeights,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup` instead of the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let log_level = lookup("ROSTER_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let defaults = ScoreWeights::default();
        let weights = ScoreWeights {
            base: parse_or(&lookup, "ROSTER_BASE_SCORE", defaults.base)?,
            fairness: parse_or(&lookup, "ROSTER_FAIRNESS_WEIGHT", defaults.fairness)?,
            preference: parse_or(&lookup, "ROSTER_PREFERENCE_WEIGHT", defaults.preference)?,
            incense: parse_or(&lookup, "ROSTER_INCENSE_WEIGHT", defaults.incense)?,
            incense_threshold: parse_or(
                &lookup,
                "ROSTER_INCENSE_THRESHOLD",
                defaults.incense_threshold,
            )?,
            never_assigned_days: parse_or(
                &lookup,
                "ROSTER_NEVER_ASSIGNED_DAYS",
                defaults.never_assigned_days,
            )?,
        };
        weights.validate()?;

        let max_attempts: u32 = parse_or(&lookup, "ROSTER_MAX_ATTEMPTS", 3)?;
        let retry = RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(parse_or(&lookup, "ROSTER_RETRY_BACKOFF_MS", 200)?),
        };

        Ok(Self {
            log_level,
            database: DbConfig::from_lookup(&lookup),
            weights,
            retry,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.weights, ScoreWeights::default());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.database.database_url, "postgres://localhost/roster");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ROSTER_FAIRNESS_WEIGHT", "2.5"),
            ("ROSTER_INCENSE_THRESHOLD", "10"),
            ("ROSTER_MAX_ATTEMPTS", "0"),
            ("DB_MAX_CONNECTIONS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.weights.fairness, 2.5);
        assert_eq!(config.weights.incense_threshold, 10);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.database.max_connections, 2);
    }

    #[test]
    fn test_malformed_number_is_an_error() {
        let err = Config::from_lookup(lookup(&[("ROSTER_PREFERENCE_WEIGHT", "lots")])).unwrap_err();
        assert!(err.to_string().contains("ROSTER_PREFERENCE_WEIGHT"));
    }

    #[test]
    fn test_invalid_weight_is_an_error() {
        let result = Config::from_lookup(lookup(&[("ROSTER_BASE_SCORE", "0")]));
        assert!(result.is_err());
    }
}
