//! # Retry Policy Module
//!
//! Exponential backoff parameters for downstream calls made while handling a
//! webhook. The policy is plain configuration: it is shared by every mutating
//! dispatch and keeps no state between invocations.

use rand::Rng;
use std::time::Duration;

/// Retry policy configuration for exponential backoff
///
/// `max_attempts` counts every call to the downstream operation, including the
/// first one. A policy with `max_attempts = 1` never retries.
///
/// # Examples
///
/// ```rust
/// use railhook_core::RetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: 3 attempts, 500ms base, 5s max, 2.0x multiplier
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.calculate_delay(0), Duration::from_millis(500));
///
/// let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(2), 1.5);
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of calls, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays
    pub use_jitter: bool,

    /// Jitter range as a fraction of the delay (0.25 = ±25%)
    pub jitter_percent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            use_jitter: false,
            jitter_percent: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy without jitter
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Total calls allowed (first call included)
    /// * `base_delay` - Delay before the first retry
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Exponential growth factor (typically 1.5-2.0)
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            backoff_multiplier,
            use_jitter: false,
            jitter_percent: 0.0,
        }
    }

    /// Policy that performs a single call and never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Disable jitter
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Enable jitter with the given percentage (0.0 to 1.0)
    pub fn with_jitter_percent(mut self, percent: f64) -> Self {
        self.jitter_percent = percent.clamp(0.0, 1.0);
        self.use_jitter = self.jitter_percent > 0.0;
        self
    }

    /// Check that the parameters describe a usable policy
    pub fn validate(&self) -> Result<(), RetryPolicyError> {
        if self.max_attempts == 0 {
            return Err(RetryPolicyError::ZeroAttempts);
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(RetryPolicyError::InvalidMultiplier {
                multiplier: self.backoff_multiplier,
            });
        }
        if self.base_delay > self.max_delay {
            return Err(RetryPolicyError::BaseExceedsMax {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        Ok(())
    }

    /// Calculate the delay before a retry
    ///
    /// Uses `min(base * multiplier^retry_index, max_delay)`, plus jitter if
    /// enabled.
    ///
    /// # Arguments
    ///
    /// * `retry_index` - Retry number (0-based: 0 is the wait after the first failure)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use railhook_core::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    ///
    /// assert_eq!(policy.calculate_delay(0), Duration::from_millis(500));
    /// assert_eq!(policy.calculate_delay(1), Duration::from_millis(1000));
    /// assert_eq!(policy.calculate_delay(10), Duration::from_secs(5));
    /// ```
    pub fn calculate_delay(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let base_delay_secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // Overflow to infinity is capped here as well
        let capped_delay_secs = base_delay_secs.min(self.max_delay.as_secs_f64()).max(0.0);

        let final_delay_secs = if self.use_jitter {
            Self::add_jitter(capped_delay_secs, self.jitter_percent)
        } else {
            capped_delay_secs
        };

        Duration::from_secs_f64(final_delay_secs)
    }

    /// Check whether another call is allowed after `attempts_made` calls
    ///
    /// # Examples
    ///
    /// ```rust
    /// use railhook_core::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default(); // max_attempts = 3
    ///
    /// assert!(policy.should_retry(1));
    /// assert!(policy.should_retry(2));
    /// assert!(!policy.should_retry(3));
    /// ```
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Delays the policy would sleep between calls, in order
    ///
    /// Has `max_attempts - 1` entries: there is no sleep after the last call.
    pub fn delay_schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|retry_index| self.calculate_delay(retry_index))
            .collect()
    }

    /// Applies random variation in range [delay * (1-jitter), delay * (1+jitter)]
    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent;
        if jitter_range <= 0.0 {
            return delay_secs;
        }

        let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
        (delay_secs + jitter).max(0.0)
    }
}

/// Reasons a [`RetryPolicy`] is unusable
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryPolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff multiplier must be >= 1.0, got {multiplier}")]
    InvalidMultiplier { multiplier: f64 },

    #[error("base delay {base:?} exceeds max delay {max:?}")]
    BaseExceedsMax { base: Duration, max: Duration },
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
