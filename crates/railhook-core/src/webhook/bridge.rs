//! Bridge webhook adapter (fiat / virtual-account rail).
//!
//! Bridge sends a flat envelope with a nested `event_object` and signs the raw
//! body with HMAC-SHA256, sent as plain hex in `Bridge-Signature`.

use super::decode::{extract_attributes, first_non_empty, parse_envelope, JsonObject};
use super::{DispatchResult, EventDispatcher, ParsedEvent, WebhookError, WebhookProvider};
use crate::downstream::{
    CardEvent, CardEventKind, CustomerStatusUpdate, DepositCredit, TransferStatus,
    TransferStatusUpdate,
};
use crate::executor::ExecutionContext;
use crate::signature::{SignatureVerifier, WebhookSecret};
use crate::ProviderKind;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

/// Fields read from `event_object`.
const EVENT_OBJECT_FIELDS: &[&str] = &[
    "amount",
    "currency",
    "id",
    "transaction_ref",
    "customer_id",
    "transaction_id",
    "merchant_name",
    "merchant_category",
    "decline_reason",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BridgeEnvelope {
    api_version: Option<String>,
    event_id: Option<String>,
    event_category: Option<String>,
    event_type: Option<String>,
    event_object_id: Option<String>,
    event_object_status: Option<String>,
    event_object: Option<JsonObject>,
    event_created_at: Option<String>,
}

/// Bridge event types this service acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    Deposit,
    TransferCompleted,
    TransferFailed,
    CardAuthorization,
    CardTransaction,
    CardDeclined,
    CardStatusChanged,
    CustomerStatusChanged,
}

impl BridgeEvent {
    pub const KNOWN_EVENT_TYPES: &'static [&'static str] = &[
        "virtual_account.deposit.received",
        "virtual_account.deposit.completed",
        "transfer.completed",
        "transfer.failed",
        "card.authorization.request",
        "card.transaction.completed",
        "card.transaction.captured",
        "card.transaction.declined",
        "card.status_changed",
        "customer.status_changed",
        "customer.kyc.approved",
        "customer.kyc.rejected",
    ];

    pub fn from_event_type(event_type: &str) -> Option<Self> {
        let event = match event_type {
            "virtual_account.deposit.received" | "virtual_account.deposit.completed" => {
                Self::Deposit
            }
            "transfer.completed" => Self::TransferCompleted,
            "transfer.failed" => Self::TransferFailed,
            "card.authorization.request" => Self::CardAuthorization,
            "card.transaction.completed" | "card.transaction.captured" => Self::CardTransaction,
            "card.transaction.declined" => Self::CardDeclined,
            "card.status_changed" => Self::CardStatusChanged,
            "customer.status_changed" | "customer.kyc.approved" | "customer.kyc.rejected" => {
                Self::CustomerStatusChanged
            }
            _ => return None,
        };
        Some(event)
    }
}

/// Adapter for `POST /webhooks/bridge`.
#[derive(Debug, Clone)]
pub struct BridgeAdapter {
    verifier: SignatureVerifier,
    dispatcher: EventDispatcher,
}

impl BridgeAdapter {
    pub const SIGNATURE_HEADERS: &'static [&'static str] = &["bridge-signature"];

    pub fn new(secret: WebhookSecret, dispatcher: EventDispatcher) -> Self {
        Self {
            verifier: SignatureVerifier::new(ProviderKind::Bridge, secret),
            dispatcher,
        }
    }

    fn card_event(&self, event: &ParsedEvent, kind: CardEventKind) -> CardEvent {
        let status = match kind {
            CardEventKind::Transaction => "completed".to_string(),
            CardEventKind::Declined => "declined".to_string(),
            CardEventKind::Authorization | CardEventKind::StatusChanged => {
                event.object_status.clone()
            }
        };

        CardEvent {
            provider: ProviderKind::Bridge,
            kind,
            card_id: event.object_id.clone(),
            transaction_id: event.attr("transaction_id").to_string(),
            amount: event.attr("amount").to_string(),
            currency: event.attr("currency").to_string(),
            merchant_name: event.attr("merchant_name").to_string(),
            merchant_category: event.attr("merchant_category").to_string(),
            status,
            decline_reason: event.attr("decline_reason").to_string(),
        }
    }

    fn transfer_update(&self, event: &ParsedEvent, status: TransferStatus) -> TransferStatusUpdate {
        let reason = match status {
            TransferStatus::Completed => String::new(),
            TransferStatus::Failed => event.object_status.clone(),
        };

        TransferStatusUpdate {
            provider: ProviderKind::Bridge,
            transfer_id: event.object_id.clone(),
            status,
            amount: event.attr("amount").to_string(),
            currency: event.attr("currency").to_string(),
            reason,
        }
    }
}

#[async_trait]
impl WebhookProvider for BridgeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bridge
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        Self::SIGNATURE_HEADERS
    }

    fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    fn decode(&self, body: &[u8]) -> Result<ParsedEvent, WebhookError> {
        let envelope: BridgeEnvelope = parse_envelope(body)?;

        let mut attributes = extract_attributes(envelope.event_object.as_ref(), EVENT_OBJECT_FIELDS);
        attributes.insert("event_category", envelope.event_category.unwrap_or_default());
        attributes.insert("api_version", envelope.api_version.unwrap_or_default());

        Ok(ParsedEvent {
            provider: ProviderKind::Bridge,
            event_id: envelope.event_id.unwrap_or_default(),
            event_type: envelope.event_type.unwrap_or_default(),
            object_id: envelope.event_object_id.unwrap_or_default(),
            object_status: envelope.event_object_status.unwrap_or_default(),
            attributes,
            created_at: envelope.event_created_at.unwrap_or_default(),
        })
    }

    #[instrument(skip_all, fields(event_id = %event.event_id, event_type = %event.event_type))]
    async fn route(&self, event: &ParsedEvent, ctx: &ExecutionContext) -> DispatchResult {
        let Some(kind) = BridgeEvent::from_event_type(&event.event_type) else {
            return DispatchResult::Ignored {
                event_type: event.event_type.clone(),
            };
        };

        match kind {
            BridgeEvent::Deposit => {
                let credit = DepositCredit {
                    provider: ProviderKind::Bridge,
                    // `.received` and `.completed` for one deposit carry different
                    // event ids, so only deposit-level ids are stable keys.
                    reference: first_non_empty(&[event.attr("transaction_ref"), event.attr("id")])
                        .to_string(),
                    account_id: event.object_id.clone(),
                    customer_id: event.attr("customer_id").to_string(),
                    amount: event.attr("amount").to_string(),
                    currency: event.attr("currency").to_string(),
                    status: event.object_status.clone(),
                    chain: None,
                    from_address: String::new(),
                    transaction_hash: String::new(),
                };
                self.dispatcher.credit_deposit(ctx, credit).await
            }
            BridgeEvent::TransferCompleted => {
                let update = self.transfer_update(event, TransferStatus::Completed);
                self.dispatcher.update_transfer(ctx, update).await
            }
            BridgeEvent::TransferFailed => {
                let update = self.transfer_update(event, TransferStatus::Failed);
                self.dispatcher.update_transfer(ctx, update).await
            }
            BridgeEvent::CardAuthorization => {
                let card = self.card_event(event, CardEventKind::Authorization);
                self.dispatcher.card_event(ctx, card).await
            }
            BridgeEvent::CardTransaction => {
                let card = self.card_event(event, CardEventKind::Transaction);
                self.dispatcher.card_event(ctx, card).await
            }
            BridgeEvent::CardDeclined => {
                let card = self.card_event(event, CardEventKind::Declined);
                self.dispatcher.card_event(ctx, card).await
            }
            BridgeEvent::CardStatusChanged => {
                let card = self.card_event(event, CardEventKind::StatusChanged);
                self.dispatcher.card_event(ctx, card).await
            }
            BridgeEvent::CustomerStatusChanged => {
                let update = CustomerStatusUpdate {
                    provider: ProviderKind::Bridge,
                    customer_id: event.object_id.clone(),
                    status: event.object_status.clone(),
                    event_type: event.event_type.clone(),
                };
                self.dispatcher.update_customer(ctx, update).await
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
