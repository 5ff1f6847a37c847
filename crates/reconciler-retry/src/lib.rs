//! Backoff strategies and data-driven retry tables for the reconciler engine.
//!
//! This crate provides:
//! - Configurable retry strategies with backoff and jitter ([`RetryStrategyConfig`],
//!   [`calculate_delay`]), used for generic "retry this fallible operation" needs.
//! - Rate-limit backoff helpers ([`rate_limit_wait`], [`rate_limit_backoff`]) for the
//!   HTTP transport's 429 handling.
//! - A small data-driven table of "known-timing" substring patterns mapped to a
//!   retry profile ([`KnownTimingProfile`], [`match_known_timing`]), so new transient
//!   error signatures can be added without touching the transport's control flow.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Strategy type for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategyType {
    /// No delay between retries - retry immediately.
    Immediate,
    /// Exponential backoff: delay doubles each attempt (default).
    #[default]
    Exponential,
    /// Linear backoff: delay increases linearly each attempt.
    Linear,
    /// Constant delay: same delay every attempt.
    Constant,
}

/// Predefined retry policies with sensible defaults for different use cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Default balanced retry behavior - good for most scenarios.
    #[default]
    Default,
    /// Aggressive retries - more attempts, faster recovery.
    Aggressive,
    /// Conservative retries - fewer attempts, longer delays.
    Conservative,
    /// Fully custom configuration.
    Custom,
}

impl RetryPolicy {
    /// Get the default retry configuration for this policy.
    pub fn to_config(&self) -> RetryStrategyConfig {
        match self {
            RetryPolicy::Default => RetryStrategyConfig {
                strategy: RetryStrategyType::Exponential,
                max_attempts: 6,
                base_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(120),
                jitter: 0.5,
            },
            RetryPolicy::Aggressive => RetryStrategyConfig {
                strategy: RetryStrategyType::Exponential,
                max_attempts: 10,
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
                jitter: 0.3,
            },
            RetryPolicy::Conservative => RetryStrategyConfig {
                strategy: RetryStrategyType::Linear,
                max_attempts: 3,
                base_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(60),
                jitter: 0.1,
            },
            RetryPolicy::Custom => RetryStrategyConfig::default(),
        }
    }
}

/// Configuration for a retry strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryStrategyConfig {
    #[serde(default)]
    pub strategy: RetryStrategyType,
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay")]
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Jitter factor (0.0 = no jitter, 1.0 = full jitter).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(120)
}

fn default_jitter() -> f64 {
    0.5
}

impl Default for RetryStrategyConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategyType::Exponential,
            max_attempts: 6,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            jitter: 0.5,
        }
    }
}

/// Calculate the delay for the next retry attempt (1-indexed).
pub fn calculate_delay(config: &RetryStrategyConfig, attempt: u32) -> Duration {
    let delay = match config.strategy {
        RetryStrategyType::Immediate => Duration::ZERO,
        RetryStrategyType::Exponential => {
            let pow = attempt.saturating_sub(1).min(16);
            config.base_delay.saturating_mul(2_u32.saturating_pow(pow))
        }
        RetryStrategyType::Linear => config.base_delay.saturating_mul(attempt),
        RetryStrategyType::Constant => config.base_delay,
    };

    let capped = delay.min(config.max_delay);

    if config.jitter > 0.0 {
        apply_jitter(capped, config.jitter)
    } else {
        capped
    }
}

/// Apply jitter to a delay. Jitter factor of 0.5 means delay * (0.5 to 1.5).
fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    use rand::Rng;

    let jitter_range = 2.0 * jitter;
    let mut rng = rand::rng();
    let random_value: f64 = rng.random();
    let random_factor = 1.0 - jitter + (random_value * jitter_range);
    let millis = (delay.as_millis() as f64 * random_factor).round() as u64;
    Duration::from_millis(millis)
}

/// A retry executor that runs a fallible operation with configured retry behavior.
pub struct RetryExecutor {
    config: RetryStrategyConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryStrategyConfig) -> Self {
        Self { config }
    }

    pub fn from_policy(policy: RetryPolicy) -> Self {
        Self::new(policy.to_config())
    }

    /// Execute a fallible operation with retry behavior. The operation receives the
    /// current attempt number (starting at 1).
    pub fn run<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt >= self.config.max_attempts {
                        return Err(e);
                    }
                    let delay = calculate_delay(&self.config, attempt);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Retry profile for a documented "known-timing" transient failure pattern. Each
/// profile is a fixed number of fixed-length waits, not a backoff curve — the
/// source system's own retry windows are known constants, not something to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownTimingProfile {
    /// 3 retries, 5s apart.
    Short,
    /// 6 retries, 5s apart.
    Medium,
    /// 5 retries, 15s apart.
    Long,
}

impl KnownTimingProfile {
    pub fn max_attempts(&self) -> u32 {
        match self {
            KnownTimingProfile::Short => 3,
            KnownTimingProfile::Medium => 6,
            KnownTimingProfile::Long => 5,
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            KnownTimingProfile::Short => Duration::from_secs(5),
            KnownTimingProfile::Medium => Duration::from_secs(5),
            KnownTimingProfile::Long => Duration::from_secs(15),
        }
    }
}

/// A single (substring-pattern, profile) rule.
#[derive(Debug, Clone, Copy)]
pub struct KnownTimingRule {
    pub pattern: &'static str,
    pub profile: KnownTimingProfile,
}

/// The documented table of transient response-body substrings and their retry
/// profile. Extending retry coverage for a newly observed transient failure is a
/// one-line addition here, not a new branch in the transport.
pub const KNOWN_TIMING_TABLE: &[KnownTimingRule] = &[
    KnownTimingRule {
        pattern: "must have a unique name",
        profile: KnownTimingProfile::Short,
    },
    KnownTimingRule {
        pattern: "Metric selector",
        profile: KnownTimingProfile::Short,
    },
    KnownTimingRule {
        pattern: "Entity selector is invalid",
        profile: KnownTimingProfile::Short,
    },
    KnownTimingRule {
        pattern: "Unknown management zone",
        profile: KnownTimingProfile::Short,
    },
    KnownTimingRule {
        pattern: "credential-vault",
        profile: KnownTimingProfile::Short,
    },
    KnownTimingRule {
        pattern: "must specify a known request attribute",
        profile: KnownTimingProfile::Medium,
    },
    KnownTimingRule {
        pattern: "Unknown application(s)",
        profile: KnownTimingProfile::Long,
    },
];

/// Match a response body against [`KNOWN_TIMING_TABLE`], returning the first
/// matching profile. `is_5xx_on_synthetic_or_app_api` covers the one rule in the
/// table that is keyed on status+API rather than body text.
pub fn match_known_timing(body: &str, is_5xx_on_synthetic_or_app_api: bool) -> Option<KnownTimingProfile> {
    if is_5xx_on_synthetic_or_app_api {
        return Some(KnownTimingProfile::Long);
    }
    KNOWN_TIMING_TABLE
        .iter()
        .find(|rule| body.contains(rule.pattern))
        .map(|rule| rule.profile)
}

/// Compute how long to sleep for a 429 response, given the server-reported reset
/// instant (microsecond epoch timestamp) and the current instant (same unit).
/// Clamped to `[1s, 60s]`.
pub fn rate_limit_wait(reset_at_micros: Option<u64>, now_micros: u64) -> Duration {
    let raw = match reset_at_micros {
        Some(reset) if reset > now_micros => Duration::from_micros(reset - now_micros),
        _ => Duration::from_secs(1),
    };
    raw.clamp(Duration::from_secs(1), Duration::from_secs(60))
}

/// Compute a randomized backoff window when rate-limit headers are absent:
/// uniform in `[min_wait, min_wait * 2^iteration]`. `iteration` is 0-indexed.
pub fn rate_limit_backoff(min_wait: Duration, iteration: u32) -> Duration {
    use rand::Rng;

    let capped_iter = iteration.min(16);
    let upper = min_wait.saturating_mul(2_u32.saturating_pow(capped_iter));
    if upper <= min_wait {
        return min_wait;
    }
    let mut rng = rand::rng();
    let span_millis = (upper.as_millis() - min_wait.as_millis()) as u64;
    let extra = if span_millis == 0 {
        0
    } else {
        rng.random_range(0..=span_millis)
    };
    min_wait + Duration::from_millis(extra)
}

/// Maximum rate-limit retry iterations before giving up.
pub const MAX_RATE_LIMIT_ITERATIONS: u32 = 5;
