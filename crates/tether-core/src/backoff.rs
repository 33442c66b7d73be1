//! Reconnect parameters and backoff calculation.
//!
//! Portable, sync-only building blocks for the client's reconnect policy:
//!
//! - [`ReconnectConfig`]: attempt budget and backoff shape
//! - [`backoff_delay`]: exponential backoff with randomized jitter
//! - [`backoff_delay_with_random`]: deterministic variant for tests
//!
//! The delay formula is `min(base * growth^attempt + jitter, cap)` where
//! `jitter` is a uniformly random offset in `[0, jitter_ms)`.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum consecutive reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default growth factor per attempt.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.5;
/// Default delay cap in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
/// Default jitter range in milliseconds.
pub const DEFAULT_JITTER_MS: u64 = 1000;

/// Reconnect policy parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectConfig {
    /// Maximum consecutive reconnect attempts before the client goes
    /// terminally disconnected (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied per attempt (default: 1.5).
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
    /// Delay cap in ms (default: 10000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Additive jitter range in ms; the actual offset is uniform in
    /// `[0, jitter_ms)` (default: 1000).
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_growth_factor() -> f64 {
    DEFAULT_GROWTH_FACTOR
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_ms() -> u64 {
    DEFAULT_JITTER_MS
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_ms: DEFAULT_JITTER_MS,
        }
    }
}

/// Calculate the reconnect delay for a zero-based attempt index, with
/// randomized jitter.
#[must_use]
pub fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    backoff_delay_with_random(attempt, config, rand::random::<f64>())
}

/// Calculate the reconnect delay with explicit randomness.
///
/// `random` must be in `[0.0, 1.0)`; it scales the additive jitter range.
/// With `random = 0.0` the result is the pure exponential value, which is
/// monotonically non-decreasing in `attempt` up to the cap.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay_with_random(attempt: u32, config: &ReconnectConfig, random: f64) -> Duration {
    let exponential = (config.base_delay_ms as f64) * config.growth_factor.powi(attempt.min(64) as i32);
    let jitter = random.clamp(0.0, 1.0) * (config.jitter_ms as f64);
    let capped = (exponential + jitter).min(config.max_delay_ms as f64);
    Duration::from_millis(capped.round().max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> ReconnectConfig {
        ReconnectConfig {
            jitter_ms: 0,
            ..ReconnectConfig::default()
        }
    }

    #[test]
    fn config_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 1000);
        assert!((config.growth_factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.max_delay_ms, 10_000);
        assert_eq!(config.jitter_ms, 1000);
    }

    #[test]
    fn config_serde_defaults() {
        let config: ReconnectConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 1000);
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = ReconnectConfig {
            max_attempts: 3,
            base_delay_ms: 200,
            growth_factor: 2.0,
            max_delay_ms: 5000,
            jitter_ms: 50,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ReconnectConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_attempts, 3);
        assert_eq!(back.base_delay_ms, 200);
        assert_eq!(back.max_delay_ms, 5000);
    }

    #[test]
    fn growth_matches_observed_constants() {
        // base 1000, growth 1.5: 1000, 1500, 2250, 3375, ...
        let config = no_jitter();
        assert_eq!(backoff_delay_with_random(0, &config, 0.0).as_millis(), 1000);
        assert_eq!(backoff_delay_with_random(1, &config, 0.0).as_millis(), 1500);
        assert_eq!(backoff_delay_with_random(2, &config, 0.0).as_millis(), 2250);
        assert_eq!(backoff_delay_with_random(3, &config, 0.0).as_millis(), 3375);
    }

    #[test]
    fn monotonic_without_jitter_up_to_cap() {
        let config = no_jitter();
        let mut prev = Duration::ZERO;
        for attempt in 0..20 {
            let delay = backoff_delay_with_random(attempt, &config, 0.0);
            assert!(delay >= prev, "delay regressed at attempt {attempt}");
            prev = delay;
        }
    }

    #[test]
    fn caps_at_max_delay() {
        let config = no_jitter();
        let delay = backoff_delay_with_random(30, &config, 0.0);
        assert_eq!(delay.as_millis(), 10_000);
    }

    #[test]
    fn jitter_is_additive_and_bounded() {
        let config = ReconnectConfig::default();
        let low = backoff_delay_with_random(0, &config, 0.0);
        let high = backoff_delay_with_random(0, &config, 0.999);
        assert_eq!(low.as_millis(), 1000);
        assert!(high >= low);
        assert!(high.as_millis() < 2000);
    }

    #[test]
    fn jitter_never_exceeds_cap() {
        let config = ReconnectConfig::default();
        let delay = backoff_delay_with_random(30, &config, 0.999);
        assert!(delay.as_millis() <= 10_000);
    }

    #[test]
    fn randomized_delay_within_bounds() {
        let config = ReconnectConfig::default();
        for _ in 0..100 {
            let delay = backoff_delay(0, &config);
            assert!(delay.as_millis() >= 1000);
            assert!(delay.as_millis() < 2000);
        }
    }

    #[test]
    fn high_attempt_does_not_overflow() {
        let config = no_jitter();
        let delay = backoff_delay_with_random(u32::MAX, &config, 0.0);
        assert_eq!(delay.as_millis(), 10_000);
    }
}
