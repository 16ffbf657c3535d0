//! Configuration types for the HTTP service
//!
//! Every field carries a serde default so that a missing file, or an
//! environment with nothing set, still yields a usable configuration.

use crate::errors::ConfigError;
use railhook_core::{ErrorClassifier, ProviderKind, RetryPolicy, WebhookSecret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Per-provider secrets and switches
    pub providers: ProvidersConfig,

    /// Retry policy and error classification for downstream calls
    pub retry: RetryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.retry.validate()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Upper bound on the time spent inside one webhook request, retries included
    pub request_timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 25,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1 MiB
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "server.request_timeout_seconds must be non-zero".to_string(),
            });
        }
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for all supported providers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub bridge: ProviderConfig,
    pub due: ProviderConfig,
    pub circle: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::Bridge => &self.bridge,
            ProviderKind::Due => &self.due,
            ProviderKind::Circle => &self.circle,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        match kind {
            ProviderKind::Bridge => &mut self.bridge,
            ProviderKind::Due => &mut self.due,
            ProviderKind::Circle => &mut self.circle,
        }
    }

    /// Providers that should be served, in [`ProviderKind::ALL`] order.
    pub fn enabled(&self) -> impl Iterator<Item = (ProviderKind, &ProviderConfig)> + '_ {
        ProviderKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
            .filter(|(_, config)| config.enabled)
    }
}

/// One provider's endpoint settings.
///
/// An empty `webhook_secret` disables signature verification for the
/// provider; every request is then accepted with a warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub webhook_secret: WebhookSecret,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_secret: WebhookSecret::disabled(),
        }
    }
}

/// Retry budget for downstream calls plus classifier extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total calls allowed per operation, first call included
    pub max_attempts: u32,

    pub base_delay_ms: u64,

    pub max_delay_ms: u64,

    pub backoff_multiplier: f64,

    /// Fraction of each delay to randomise by (0.0 disables jitter)
    pub jitter_percent: f64,

    /// Additional substrings that mark a downstream failure as retryable
    pub extra_retryable_keywords: Vec<String>,

    /// Additional substrings that mark a downstream failure as terminal
    pub extra_terminal_keywords: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: duration_millis(policy.base_delay),
            max_delay_ms: duration_millis(policy.max_delay),
            backoff_multiplier: policy.backoff_multiplier,
            jitter_percent: 0.0,
            extra_retryable_keywords: Vec::new(),
            extra_terminal_keywords: Vec::new(),
        }
    }
}

impl RetryConfig {
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.backoff_multiplier,
        )
        .with_jitter_percent(self.jitter_percent)
    }

    /// Default keyword sets extended with the configured keywords.
    pub fn to_classifier(&self) -> ErrorClassifier {
        let classifier = self
            .extra_terminal_keywords
            .iter()
            .fold(ErrorClassifier::default(), |c, keyword| {
                c.with_terminal_keyword(keyword)
            });
        self.extra_retryable_keywords
            .iter()
            .fold(classifier, |c, keyword| c.with_retryable_keyword(keyword))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.jitter_percent) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "retry.jitter_percent must be between 0.0 and 1.0, got {}",
                    self.jitter_percent
                ),
            });
        }
        self.to_retry_policy().validate()?;
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
