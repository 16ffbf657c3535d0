//! # Railhook Core
//!
//! Core logic for ingesting payment-rail webhooks (Bridge, Due, Circle) and
//! turning them into idempotent, retried state transitions.
//!
//! This crate contains everything between the raw HTTP body and the
//! downstream ledger/account collaborators:
//!
//! - [`signature`]: HMAC-SHA256 authenticity checks over the raw body
//! - [`webhook`]: per-provider decoding, event routing and the processing pipeline
//! - [`classifier`]: keyword-based retryable/terminal error classification
//! - [`retry`] and [`executor`]: bounded exponential backoff around downstream calls
//! - [`downstream`]: the capability traits the adapters invoke
//!
//! ## Architecture
//!
//! Business logic depends only on trait abstractions; collaborators are
//! injected at construction time. No state is shared between requests apart
//! from the immutable configuration each adapter is built with.
//!
//! ## Usage
//!
//! ```rust
//! use railhook_core::ProviderKind;
//!
//! let provider: ProviderKind = "bridge".parse().unwrap();
//! assert_eq!(provider, ProviderKind::Bridge);
//! assert_eq!(provider.as_str(), "bridge");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod classifier;
pub mod downstream;
pub mod executor;
pub mod retry;
pub mod signature;
pub mod webhook;

pub use classifier::{ErrorClass, ErrorClassifier};
pub use downstream::{
    CardEvent, CardEventKind, CardProcessor, Chain, Collaborators, CustomerRegistry,
    CustomerStatusUpdate, DepositCredit, DepositLedger, DownstreamError, Notification,
    NotificationKind, Notifier, TransferLedger, TransferStatus, TransferStatusUpdate,
};
pub use executor::{ExecutionContext, ExecutionError, ExecutionOutcome, RetryExecutor};
pub use retry::{RetryPolicy, RetryPolicyError};
pub use signature::{SignatureVerifier, Verification, WebhookSecret};
pub use webhook::{
    process_webhook, Acknowledgment, BridgeAdapter, CircleAdapter, DispatchResult, DueAdapter,
    EventAttributes, EventDispatcher, ParsedEvent, RawWebhookRequest, WebhookError,
    WebhookProvider,
};

// ============================================================================
// Provider Identification
// ============================================================================

/// The external payment rails this service accepts webhooks from.
///
/// The set is closed: each variant has a dedicated adapter with its own
/// signature header, envelope shape and event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Fiat / virtual-account rail (deposits, transfers, cards, KYC).
    Bridge,
    /// Transfer rail (on/off-ramp transfers and virtual-account deposits).
    Due,
    /// Stablecoin custody rail (on-chain USDC transfers).
    Circle,
}

impl ProviderKind {
    /// Every supported provider, in registration order.
    pub const ALL: [ProviderKind; 3] = [Self::Bridge, Self::Due, Self::Circle];

    /// URL-safe slug used in `POST /webhooks/{provider}`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Due => "due",
            Self::Circle => "circle",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bridge" => Ok(Self::Bridge),
            "due" => Ok(Self::Due),
            "circle" => Ok(Self::Circle),
            other => Err(ParseError::UnknownProvider {
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Time
// ============================================================================

/// UTC timestamp used for request receipt times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization used for logging and acknowledgment decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Signature mismatch; rejected before parsing.
    Authentication,
    /// Structurally malformed body; rejected, never routed.
    Parse,
    /// Business failure that will not succeed on retry.
    Terminal,
    /// Temporary failure that was (or may be) retried internally.
    Transient,
}

impl ErrorCategory {
    /// Get category string for logs and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Parse => "parse",
            Self::Terminal => "terminal",
            Self::Transient => "transient",
        }
    }
}

/// Parsing errors for identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown provider: {value}")]
    UnknownProvider { value: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
