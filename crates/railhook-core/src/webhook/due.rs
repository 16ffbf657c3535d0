//! Due webhook adapter (transfer rail).
//!
//! Envelope: `{"type": .., "timestamp": .., "data": {..}}`. Transfer payloads
//! carry split `source` and `destination` legs. Due envelopes have no event
//! id, so one is derived from the event type and object id.

use super::decode::{extract_attributes, first_non_empty, parse_envelope, JsonObject};
use super::{DispatchResult, EventDispatcher, ParsedEvent, WebhookError, WebhookProvider};
use crate::downstream::{DepositCredit, TransferStatus, TransferStatusUpdate};
use crate::executor::ExecutionContext;
use crate::signature::{SignatureVerifier, WebhookSecret};
use crate::ProviderKind;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

/// Fields read from `data`, covering both transfer and deposit payloads.
const DATA_FIELDS: &[&str] = &[
    "id",
    "ownerId",
    "status",
    "virtualAccountId",
    "amount",
    "currency",
    "reference",
    "txRef",
    "createdAt",
    "source.amount",
    "source.currency",
    "source.rail",
    "destination.amount",
    "destination.currency",
    "destination.rail",
    "destination.id",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DueEnvelope {
    #[serde(rename = "type")]
    event_type: Option<String>,
    timestamp: Option<String>,
    data: Option<JsonObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueEvent {
    TransferCompleted,
    TransferFailed,
    Deposit,
}

impl DueEvent {
    pub const KNOWN_EVENT_TYPES: &'static [&'static str] = &[
        "transfer.completed",
        "transfer.failed",
        "deposit.received",
        "deposit.confirmed",
    ];

    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "transfer.completed" => Some(Self::TransferCompleted),
            "transfer.failed" => Some(Self::TransferFailed),
            "deposit.received" | "deposit.confirmed" => Some(Self::Deposit),
            _ => None,
        }
    }
}

/// Adapter for `POST /webhooks/due`.
#[derive(Debug, Clone)]
pub struct DueAdapter {
    verifier: SignatureVerifier,
    dispatcher: EventDispatcher,
}

impl DueAdapter {
    pub const SIGNATURE_HEADERS: &'static [&'static str] = &["x-due-signature"];

    pub fn new(secret: WebhookSecret, dispatcher: EventDispatcher) -> Self {
        Self {
            verifier: SignatureVerifier::new(ProviderKind::Due, secret),
            dispatcher,
        }
    }
}

#[async_trait]
impl WebhookProvider for DueAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Due
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        Self::SIGNATURE_HEADERS
    }

    fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    fn decode(&self, body: &[u8]) -> Result<ParsedEvent, WebhookError> {
        let envelope: DueEnvelope = parse_envelope(body)?;
        let attributes = extract_attributes(envelope.data.as_ref(), DATA_FIELDS);

        let event_type = envelope.event_type.unwrap_or_default();
        let object_id =
            first_non_empty(&[attributes.get("id"), attributes.get("virtualAccountId")]).to_string();
        let event_id = if object_id.is_empty() {
            String::new()
        } else {
            format!("{event_type}:{object_id}")
        };
        let created_at = first_non_empty(&[
            attributes.get("createdAt"),
            envelope.timestamp.as_deref().unwrap_or(""),
        ])
        .to_string();

        Ok(ParsedEvent {
            provider: ProviderKind::Due,
            event_id,
            event_type,
            object_status: attributes.get("status").to_string(),
            object_id,
            attributes,
            created_at,
        })
    }

    #[instrument(skip_all, fields(event_id = %event.event_id, event_type = %event.event_type))]
    async fn route(&self, event: &ParsedEvent, ctx: &ExecutionContext) -> DispatchResult {
        let Some(kind) = DueEvent::from_event_type(&event.event_type) else {
            return DispatchResult::Ignored {
                event_type: event.event_type.clone(),
            };
        };

        match kind {
            DueEvent::TransferCompleted => {
                let update = TransferStatusUpdate {
                    provider: ProviderKind::Due,
                    transfer_id: event.attr("id").to_string(),
                    status: TransferStatus::Completed,
                    amount: event.attr("destination.amount").to_string(),
                    currency: event.attr("destination.currency").to_string(),
                    reason: String::new(),
                };
                self.dispatcher.update_transfer(ctx, update).await
            }
            DueEvent::TransferFailed => {
                let update = TransferStatusUpdate {
                    provider: ProviderKind::Due,
                    transfer_id: event.attr("id").to_string(),
                    status: TransferStatus::Failed,
                    amount: event.attr("source.amount").to_string(),
                    currency: event.attr("source.currency").to_string(),
                    reason: event.object_status.clone(),
                };
                self.dispatcher.update_transfer(ctx, update).await
            }
            DueEvent::Deposit => {
                let account_id = event.attr("virtualAccountId");
                let credit = DepositCredit {
                    provider: ProviderKind::Due,
                    // The virtual account receives many deposits, so it is never a key.
                    reference: first_non_empty(&[event.attr("txRef"), event.attr("reference")])
                        .to_string(),
                    account_id: account_id.to_string(),
                    customer_id: event.attr("ownerId").to_string(),
                    amount: event.attr("amount").to_string(),
                    currency: event.attr("currency").to_string(),
                    status: event.object_status.clone(),
                    chain: None,
                    from_address: String::new(),
                    transaction_hash: String::new(),
                };
                self.dispatcher.credit_deposit(ctx, credit).await
            }
        }
    }
}

#[cfg(test)]
#[path = "due_tests.rs"]
mod tests;
