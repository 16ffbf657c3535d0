//! Response bodies returned by the API.

use railhook_core::{Acknowledgment, ProviderKind, Timestamp};
use serde::Serialize;

/// Webhook acknowledgment body.
///
/// Returned with `200 OK` for every request that passed verification and
/// parsing, whatever the downstream outcome.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `success`, `acknowledged`, `ignored` or `error`
    pub status: String,
    pub event_id: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Acknowledgment> for WebhookResponse {
    fn from(ack: Acknowledgment) -> Self {
        Self {
            status: ack.result.status().to_string(),
            message: ack.result.message().map(str::to_string),
            event_id: ack.event_id,
            event_type: ack.event_type,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
    /// Providers currently accepting webhooks
    pub providers: Vec<ProviderKind>,
}
