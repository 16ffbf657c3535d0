//! # Webhook Processing Module
//!
//! Turns one raw provider request into one acknowledgment:
//!
//! ```text
//! Received -> Verified -> Parsed -> Routed -> {Processed | Acknowledged | Ignored | AcknowledgedWithError}
//!     |           |
//!     |           +-> Failed(Parse)   400
//!     +-> Failed(Auth)                401
//! ```
//!
//! Each provider implements [`WebhookProvider`]; [`process_webhook`] runs the
//! shared pipeline over any of them. Only authentication and parse failures
//! are returned as errors. Everything that happens after routing, including
//! terminal downstream failures, is folded into a [`DispatchResult`] so the
//! provider receives a success-class response and stops redelivering.

use crate::executor::ExecutionContext;
use crate::signature::{SignatureVerifier, Verification};
use crate::{ErrorCategory, ProviderKind, Timestamp};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info, instrument, warn};

pub mod bridge;
pub mod circle;
mod decode;
pub mod dispatch;
pub mod due;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::BridgeAdapter;
pub use circle::CircleAdapter;
pub use dispatch::EventDispatcher;
pub use due::DueAdapter;

// ============================================================================
// Core Types
// ============================================================================

/// Raw HTTP request data as received from a provider.
///
/// Header names are stored lowercase; lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct RawWebhookRequest {
    pub provider: ProviderKind,
    pub body: Bytes,
    headers: HashMap<String, String>,
    pub received_at: Timestamp,
}

impl RawWebhookRequest {
    /// Create new webhook request stamped with the current time
    pub fn new<I, K, V>(provider: ProviderKind, headers: I, body: impl Into<Bytes>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
            .collect();

        Self {
            provider,
            body: body.into(),
            headers,
            received_at: Timestamp::now(),
        }
    }

    /// Get a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Provider-specific fields a decoder extracted, by name.
///
/// The key set is fixed by the decoder's field list; every listed key is
/// present, and missing payload fields read as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventAttributes(BTreeMap<&'static str, String>);

impl EventAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    /// Value for `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Typed result of decoding one provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedEvent {
    pub provider: ProviderKind,
    pub event_id: String,
    pub event_type: String,
    pub object_id: String,
    pub object_status: String,
    pub attributes: EventAttributes,
    pub created_at: String,
}

impl ParsedEvent {
    /// Shorthand for `self.attributes.get(key)`.
    pub fn attr(&self, key: &str) -> &str {
        self.attributes.get(key)
    }
}

/// How a routed event ended. Shapes the `200` response body only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// The downstream effect was applied, or was already applied.
    Processed,
    /// A failure notice (declined card, failed transfer) was recorded.
    Acknowledged,
    /// The event type is not handled by this service.
    Ignored { event_type: String },
    /// Business failure that redelivery will not fix.
    AcknowledgedWithError { message: String },
}

impl DispatchResult {
    /// Value of the `status` field in the response body.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Processed => "success",
            Self::Acknowledged => "acknowledged",
            Self::Ignored { .. } => "ignored",
            Self::AcknowledgedWithError { .. } => "error",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::AcknowledgedWithError { message } => Some(message),
            _ => None,
        }
    }
}

/// What the HTTP layer needs to answer the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    pub provider: ProviderKind,
    pub event_id: String,
    pub event_type: String,
    pub result: DispatchResult,
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures that end a request before routing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("Signature validation failed for {provider}: {reason}")]
    InvalidSignature {
        provider: ProviderKind,
        reason: &'static str,
    },

    #[error("Request body could not be read: {message}")]
    InvalidBody { message: String },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },
}

impl WebhookError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSignature { .. } => ErrorCategory::Authentication,
            Self::InvalidBody { .. } | Self::MalformedPayload { .. } => ErrorCategory::Parse,
        }
    }
}

// ============================================================================
// Provider Interface
// ============================================================================

/// One payment rail: signature convention, payload decoder and event router.
#[async_trait]
pub trait WebhookProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Header names carrying the signature, in lookup order.
    fn signature_headers(&self) -> &'static [&'static str];

    fn verifier(&self) -> &SignatureVerifier;

    /// Check the request signature over the raw body.
    ///
    /// The first non-empty header in [`Self::signature_headers`] is used.
    fn verify(&self, request: &RawWebhookRequest) -> Verification {
        let signature = self
            .signature_headers()
            .iter()
            .filter_map(|name| request.header(name))
            .find(|value| !value.trim().is_empty());
        self.verifier().verify(signature, &request.body)
    }

    /// Structural extraction only; no business decisions.
    fn decode(&self, body: &[u8]) -> Result<ParsedEvent, WebhookError>;

    /// Dispatch a decoded event. Total over every event type.
    async fn route(&self, event: &ParsedEvent, ctx: &ExecutionContext) -> DispatchResult;
}

/// Run the verify, decode and route pipeline for one request.
///
/// Returns an error only for authentication and parse failures.
#[instrument(skip_all, fields(provider = %provider.kind()))]
pub async fn process_webhook(
    provider: &dyn WebhookProvider,
    request: &RawWebhookRequest,
    ctx: &ExecutionContext,
) -> Result<Acknowledgment, WebhookError> {
    if let Verification::Rejected(reason) = provider.verify(request) {
        warn!(reason = reason.as_str(), "Invalid webhook signature");
        return Err(WebhookError::InvalidSignature {
            provider: provider.kind(),
            reason: reason.as_str(),
        });
    }

    let event = provider.decode(&request.body).map_err(|e| {
        error!(error = %e, "Failed to parse webhook payload");
        e
    })?;

    info!(
        event_id = %event.event_id,
        event_type = %event.event_type,
        object_id = %event.object_id,
        "Received webhook"
    );

    let result = provider.route(&event, ctx).await;

    match &result {
        DispatchResult::Ignored { event_type } => {
            info!(event_type = %event_type, "Unhandled event type - acknowledged as ignored");
        }
        DispatchResult::AcknowledgedWithError { message } => {
            error!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                error = %message,
                "Webhook acknowledged with processing error - operator follow-up required"
            );
        }
        DispatchResult::Processed | DispatchResult::Acknowledged => {
            info!(
                event_id = %event.event_id,
                status = result.status(),
                "Webhook processed"
            );
        }
    }

    Ok(Acknowledgment {
        provider: provider.kind(),
        event_id: event.event_id,
        event_type: event.event_type,
        result,
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
