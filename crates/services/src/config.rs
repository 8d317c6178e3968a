use std::env;
use std::time::Duration;

use arco_core::AdvancePolicy;

use crate::error::ConfigLoadError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(2_000);
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

/// Runtime knobs for the training and history services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicesConfig {
    /// Upper bound for one remote write.
    pub request_timeout: Duration,
    /// Quiet period before the running session is written to the local cache.
    pub autosave_delay: Duration,
    pub cache_ttl: chrono::Duration,
    pub advance_policy: AdvancePolicy,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            cache_ttl: chrono::Duration::hours(DEFAULT_CACHE_TTL_HOURS),
            advance_policy: AdvancePolicy::default(),
        }
    }
}

impl ServicesConfig {
    /// Read `ARCO_REQUEST_TIMEOUT_MS`, `ARCO_AUTOSAVE_DELAY_MS`,
    /// `ARCO_CACHE_TTL_HOURS` and `ARCO_ADVANCE_POLICY`; unset keys keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigLoadError::Invalid` for values that do not parse.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ServicesConfig::from_env`] with a custom source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigLoadError::Invalid` for values that do not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigLoadError> {
        let mut config = Self::default();

        if let Some(ms) = parse::<u64>(&lookup, "ARCO_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "ARCO_AUTOSAVE_DELAY_MS")? {
            config.autosave_delay = Duration::from_millis(ms);
        }
        if let Some(hours) = parse::<u32>(&lookup, "ARCO_CACHE_TTL_HOURS")? {
            config.cache_ttl = chrono::Duration::hours(i64::from(hours));
        }
        if let Some(policy) = parse::<AdvancePolicy>(&lookup, "ARCO_ADVANCE_POLICY")? {
            config.advance_policy = policy;
        }
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigLoadError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigLoadError::Invalid { key, value: raw })
}
