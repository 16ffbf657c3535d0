//! Circle webhook adapter (stablecoin custody rail).
//!
//! Circle notifications describe a transfer with `source` and `destination`
//! endpoints. Only transfers whose source is an on-chain address are inbound
//! deposits; wallet-to-wallet and wire movements are acknowledged without a
//! downstream call.

use super::decode::{
    extract_attributes, first_non_empty, is_decimal_amount, parse_envelope, JsonObject,
};
use super::{DispatchResult, EventDispatcher, ParsedEvent, WebhookError, WebhookProvider};
use crate::downstream::{Chain, DepositCredit, TransferStatus, TransferStatusUpdate};
use crate::executor::ExecutionContext;
use crate::signature::{SignatureVerifier, WebhookSecret};
use crate::ProviderKind;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

/// Fields read from `transfer`.
const TRANSFER_FIELDS: &[&str] = &[
    "id",
    "source.type",
    "source.id",
    "source.chain",
    "source.address",
    "destination.type",
    "destination.id",
    "destination.chain",
    "destination.address",
    "amount.amount",
    "amount.currency",
    "transactionHash",
    "status",
    "createDate",
    "errorCode",
];

const BLOCKCHAIN_SOURCE: &str = "blockchain";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CircleEnvelope {
    notification_type: Option<String>,
    transfer_id: Option<String>,
    transfer: Option<JsonObject>,
    timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircleEvent {
    IncomingTransfer,
    TransferFailed,
}

impl CircleEvent {
    pub const KNOWN_EVENT_TYPES: &'static [&'static str] =
        &["transfers.created", "transfers.completed", "transfers.failed"];

    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "transfers.created" | "transfers.completed" => Some(Self::IncomingTransfer),
            "transfers.failed" => Some(Self::TransferFailed),
            _ => None,
        }
    }
}

/// Adapter for `POST /webhooks/circle`.
#[derive(Debug, Clone)]
pub struct CircleAdapter {
    verifier: SignatureVerifier,
    dispatcher: EventDispatcher,
}

impl CircleAdapter {
    /// `X-Circle-Signature`, falling back to the generic `X-Webhook-Signature`.
    pub const SIGNATURE_HEADERS: &'static [&'static str] =
        &["x-circle-signature", "x-webhook-signature"];

    pub fn new(secret: WebhookSecret, dispatcher: EventDispatcher) -> Self {
        Self {
            verifier: SignatureVerifier::new(ProviderKind::Circle, secret),
            dispatcher,
        }
    }

    async fn incoming_transfer(&self, event: &ParsedEvent, ctx: &ExecutionContext) -> DispatchResult {
        let source_type = event.attr("source.type");
        if source_type != BLOCKCHAIN_SOURCE {
            debug!(
                transfer_id = %event.object_id,
                source_type,
                "Ignoring non-blockchain transfer"
            );
            return DispatchResult::Processed;
        }

        let amount = event.attr("amount.amount");
        if !is_decimal_amount(amount) {
            error!(transfer_id = %event.object_id, amount, "Invalid transfer amount");
            return DispatchResult::AcknowledgedWithError {
                message: format!("invalid amount: {amount:?}"),
            };
        }

        let chain = Chain::from_provider_code(event.attr("source.chain"));
        if let Chain::Other(code) = &chain {
            warn!(chain = %code, transfer_id = %event.object_id, "Unknown Circle chain");
        }

        let credit = DepositCredit {
            provider: ProviderKind::Circle,
            // The hash is often missing on `transfers.created`; the transfer id
            // is the same on every notification for this transfer.
            reference: event.object_id.clone(),
            account_id: event.attr("destination.id").to_string(),
            customer_id: String::new(),
            amount: amount.to_string(),
            currency: event.attr("amount.currency").to_string(),
            status: event.object_status.clone(),
            chain: Some(chain),
            from_address: event.attr("source.address").to_string(),
            transaction_hash: event.attr("transactionHash").to_string(),
        };
        self.dispatcher.credit_deposit(ctx, credit).await
    }
}

#[async_trait]
impl WebhookProvider for CircleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Circle
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        Self::SIGNATURE_HEADERS
    }

    fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    fn decode(&self, body: &[u8]) -> Result<ParsedEvent, WebhookError> {
        let envelope: CircleEnvelope = parse_envelope(body)?;
        let attributes = extract_attributes(envelope.transfer.as_ref(), TRANSFER_FIELDS);

        let event_type = envelope.notification_type.unwrap_or_default();
        let object_id = first_non_empty(&[
            envelope.transfer_id.as_deref().unwrap_or(""),
            attributes.get("id"),
        ])
        .to_string();
        let event_id = if object_id.is_empty() {
            String::new()
        } else {
            format!("{event_type}:{object_id}")
        };
        let created_at = first_non_empty(&[
            attributes.get("createDate"),
            envelope.timestamp.as_deref().unwrap_or(""),
        ])
        .to_string();

        Ok(ParsedEvent {
            provider: ProviderKind::Circle,
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
        let Some(kind) = CircleEvent::from_event_type(&event.event_type) else {
            return DispatchResult::Ignored {
                event_type: event.event_type.clone(),
            };
        };

        match kind {
            CircleEvent::IncomingTransfer => self.incoming_transfer(event, ctx).await,
            CircleEvent::TransferFailed => {
                let update = TransferStatusUpdate {
                    provider: ProviderKind::Circle,
                    transfer_id: event.object_id.clone(),
                    status: TransferStatus::Failed,
                    amount: event.attr("amount.amount").to_string(),
                    currency: event.attr("amount.currency").to_string(),
                    reason: event.attr("errorCode").to_string(),
                };
                self.dispatcher.update_transfer(ctx, update).await
            }
        }
    }
}

#[cfg(test)]
#[path = "circle_tests.rs"]
mod tests;
