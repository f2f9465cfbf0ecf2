use std::num::ParseIntError;

use chrono::TimeDelta;
use thiserror::Error;

pub const GRACE_PERIOD_ENV: &str = "GRACEFUL_GRACE_PERIOD_MS";
pub const DEFAULT_GRACE_PERIOD_MS: i64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GRACEFUL_GRACE_PERIOD_MS must be an integer number of milliseconds (got {value:?})")]
    InvalidGracePeriod {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("GRACEFUL_GRACE_PERIOD_MS is out of range: {0}")]
    GracePeriodOutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracefulConfig {
    pub grace_period: TimeDelta,
}

impl Default for GracefulConfig {
    fn default() -> Self {
        Self {
            grace_period: TimeDelta::milliseconds(DEFAULT_GRACE_PERIOD_MS),
        }
    }
}

impl GracefulConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Negative values load fine; the shrinker rejects them per invocation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = lookup(GRACE_PERIOD_ENV).unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let millis = raw
            .parse::<i64>()
            .map_err(|source| ConfigError::InvalidGracePeriod {
                value: raw.to_string(),
                source,
            })?;
        let grace_period =
            TimeDelta::try_milliseconds(millis).ok_or(ConfigError::GracePeriodOutOfRange(millis))?;

        Ok(Self { grace_period })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(value: Option<&'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| {
            assert_eq!(key, GRACE_PERIOD_ENV);
            value.map(str::to_string)
        }
    }

    #[test]
    fn defaults_when_unset_or_blank() {
        let expected = TimeDelta::milliseconds(DEFAULT_GRACE_PERIOD_MS);
        let unset = GracefulConfig::from_lookup(lookup_from(None)).expect("unset loads");
        let blank = GracefulConfig::from_lookup(lookup_from(Some("  "))).expect("blank loads");
        assert_eq!(unset.grace_period, expected);
        assert_eq!(blank.grace_period, expected);
    }

    #[test]
    fn parses_milliseconds() {
        let config = GracefulConfig::from_lookup(lookup_from(Some(" 1500 "))).expect("valid value");
        assert_eq!(config.grace_period, TimeDelta::milliseconds(1500));
    }

    #[test]
    fn keeps_negative_values_for_invocation_time_rejection() {
        let config = GracefulConfig::from_lookup(lookup_from(Some("-250"))).expect("negative loads");
        assert_eq!(config.grace_period, TimeDelta::milliseconds(-250));
    }

    #[test]
    fn rejects_non_numeric_values() {
        let error = GracefulConfig::from_lookup(lookup_from(Some("1s")))
            .expect_err("non-numeric value should fail");
        assert!(error.to_string().contains(GRACE_PERIOD_ENV));
        assert!(matches!(error, ConfigError::InvalidGracePeriod { .. }));
    }
}
