use std::str::FromStr;
use std::time::Duration;

use nm_core::quality_gate::{
    GateThresholds, DEFAULT_CONSISTENCY_THRESHOLD, DEFAULT_QUALITY_THRESHOLD,
};
use nm_core::retry::{BackoffConfig, DEFAULT_SLOT_ATTEMPTS, DEFAULT_TRANSPORT_ATTEMPTS};

/// Default base URL of the character library service.
pub const DEFAULT_BASE_URL: &str = "https://character.ft.tc";

/// Character library configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Deadline for every remote call.
    pub timeout: Duration,
    /// Attempts per remote call (caller-side transport retry).
    pub retry_attempts: u32,
    pub quality_threshold: f64,
    pub consistency_threshold: f64,
    /// Generation attempts per pipeline slot.
    pub max_retries: u32,
    /// Deadline for the health probe.
    pub health_timeout: Duration,
    /// First backoff delay of the transport retry.
    pub retry_base_delay: Duration,
    /// Characters synced in parallel by a project sync.
    pub sync_concurrency: usize,
    /// Style hint passed to smart-image generation.
    pub default_style: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(60_000),
            retry_attempts: DEFAULT_TRANSPORT_ATTEMPTS,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            consistency_threshold: DEFAULT_CONSISTENCY_THRESHOLD,
            max_retries: DEFAULT_SLOT_ATTEMPTS,
            health_timeout: Duration::from_millis(10_000),
            retry_base_delay: Duration::from_millis(1_000),
            sync_concurrency: 3,
            default_style: "character_production".to_string(),
        }
    }
}

impl LibraryConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                                   | Default                   |
    /// |-------------------------------------------|---------------------------|
    /// | `CHARACTER_LIBRARY_API_URL`               | `https://character.ft.tc` |
    /// | `CHARACTER_LIBRARY_TIMEOUT`               | `60000` (ms)              |
    /// | `CHARACTER_LIBRARY_RETRY_ATTEMPTS`        | `3`                       |
    /// | `CHARACTER_LIBRARY_QUALITY_THRESHOLD`     | `70`                      |
    /// | `CHARACTER_LIBRARY_CONSISTENCY_THRESHOLD` | `85`                      |
    /// | `CHARACTER_LIBRARY_MAX_RETRIES`           | `5`                       |
    /// | `CHARACTER_LIBRARY_HEALTH_TIMEOUT`        | `10000` (ms)              |
    /// | `CHARACTER_LIBRARY_RETRY_BASE_DELAY`      | `1000` (ms)               |
    /// | `CHARACTER_LIBRARY_SYNC_CONCURRENCY`      | `3`                       |
    /// | `CHARACTER_LIBRARY_STYLE`                 | `character_production`    |
    ///
    /// Unparsable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("CHARACTER_LIBRARY_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.base_url);

        let timeout_ms = env_or("CHARACTER_LIBRARY_TIMEOUT", 60_000u64);
        let health_timeout_ms = env_or("CHARACTER_LIBRARY_HEALTH_TIMEOUT", 10_000u64);
        let retry_base_delay_ms = env_or("CHARACTER_LIBRARY_RETRY_BASE_DELAY", 1_000u64);

        Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
            retry_attempts: env_or("CHARACTER_LIBRARY_RETRY_ATTEMPTS", defaults.retry_attempts),
            quality_threshold: threshold_or(
                "CHARACTER_LIBRARY_QUALITY_THRESHOLD",
                defaults.quality_threshold,
            ),
            consistency_threshold: threshold_or(
                "CHARACTER_LIBRARY_CONSISTENCY_THRESHOLD",
                defaults.consistency_threshold,
            ),
            max_retries: env_or("CHARACTER_LIBRARY_MAX_RETRIES", defaults.max_retries),
            health_timeout: Duration::from_millis(health_timeout_ms),
            retry_base_delay: Duration::from_millis(retry_base_delay_ms),
            sync_concurrency: env_or(
                "CHARACTER_LIBRARY_SYNC_CONCURRENCY",
                defaults.sync_concurrency,
            )
            .max(1),
            default_style: std::env::var("CHARACTER_LIBRARY_STYLE")
                .unwrap_or(defaults.default_style),
        }
    }

    pub fn thresholds(&self) -> GateThresholds {
        GateThresholds {
            quality: self.quality_threshold,
            consistency: self.consistency_threshold,
        }
    }

    /// Backoff for the transport retry, starting at `retry_base_delay`.
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.retry_base_delay,
            ..BackoffConfig::default()
        }
    }
}

/// A gate threshold on the 0-100 score scale. Non-finite or out-of-range
/// values fall back to `default`.
fn threshold_or(key: &str, default: f64) -> f64 {
    let value = env_or(key, default);
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        value
    } else {
        tracing::warn!(key, value, default, "Threshold out of range, using default");
        default
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                key,
                value = %raw,
                default = %default,
                "Invalid config value, using default",
            );
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = LibraryConfig::default();
        assert_eq!(config.base_url, "https://character.ft.tc");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.thresholds(), GateThresholds::default());
    }

    #[test]
    fn backoff_starts_at_base_delay() {
        let config = LibraryConfig {
            retry_base_delay: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(config.backoff().initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("NM_LIBRARY_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("NM_LIBRARY_TEST_GARBAGE", 7u32), 7);
        std::env::set_var("NM_LIBRARY_TEST_NUMBER", " 12 ");
        assert_eq!(env_or("NM_LIBRARY_TEST_NUMBER", 7u32), 12);
    }

    #[test]
    fn threshold_rejects_non_finite_and_out_of_range() {
        std::env::set_var("NM_LIBRARY_TEST_NAN", "NaN");
        assert_eq!(threshold_or("NM_LIBRARY_TEST_NAN", 85.0), 85.0);
        std::env::set_var("NM_LIBRARY_TEST_INF", "inf");
        assert_eq!(threshold_or("NM_LIBRARY_TEST_INF", 85.0), 85.0);
        std::env::set_var("NM_LIBRARY_TEST_HIGH", "250");
        assert_eq!(threshold_or("NM_LIBRARY_TEST_HIGH", 70.0), 70.0);
        std::env::set_var("NM_LIBRARY_TEST_OK", "92.5");
        assert_eq!(threshold_or("NM_LIBRARY_TEST_OK", 70.0), 92.5);
    }
}
