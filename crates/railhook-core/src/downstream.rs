//! Downstream capabilities invoked by the provider adapters.
//!
//! The ledger, account and notification logic lives outside this crate. The
//! adapters only see these traits, injected at construction time through
//! [`Collaborators`]. Every mutating operation is expected to be idempotent on
//! its key: a repeated call for an effect that was already applied must fail
//! with a message the [`crate::ErrorClassifier`] recognises as "already
//! processed" (or succeed without side effects).

use crate::ProviderKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by a downstream collaborator.
///
/// Only the message is inspected; see [`crate::classifier`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DownstreamError {
    message: String,
}

impl DownstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Blockchain network of an on-chain deposit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Solana,
    Polygon,
    Aptos,
    Starknet,
    /// A network this service has no mapping for, carried verbatim.
    Other(String),
}

impl Chain {
    /// Map a custody-provider chain code (`SOL`, `MATIC`, ...) to a [`Chain`].
    pub fn from_provider_code(code: &str) -> Self {
        match code {
            "SOL" | "solana" => Self::Solana,
            "MATIC" | "polygon" => Self::Polygon,
            "APTOS" | "aptos" => Self::Aptos,
            "STARKNET" | "starknet" => Self::Starknet,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Solana => "solana",
            Self::Polygon => "polygon",
            Self::Aptos => "aptos",
            Self::Starknet => "starknet",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credit an inbound deposit to an account.
///
/// `reference` is the idempotency key: crediting the same reference twice
/// must not move funds twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositCredit {
    pub provider: ProviderKind,
    pub reference: String,
    /// Virtual account or custody wallet receiving the funds.
    pub account_id: String,
    pub customer_id: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    /// Set for on-chain deposits only.
    pub chain: Option<Chain>,
    pub from_address: String,
    /// On-chain transaction hash, empty until the network confirms it.
    pub transaction_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Record the final state of an outbound transfer, keyed by `transfer_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatusUpdate {
    pub provider: ProviderKind,
    pub transfer_id: String,
    pub status: TransferStatus,
    pub amount: String,
    pub currency: String,
    /// Failure reason; empty for completed transfers.
    pub reason: String,
}

/// Apply a customer or KYC status change, keyed by `customer_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerStatusUpdate {
    pub provider: ProviderKind,
    pub customer_id: String,
    pub status: String,
    pub event_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardEventKind {
    Authorization,
    Transaction,
    Declined,
    StatusChanged,
}

impl CardEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorization => "authorization",
            Self::Transaction => "transaction",
            Self::Declined => "declined",
            Self::StatusChanged => "status_changed",
        }
    }
}

/// Card authorization, transaction, decline or status change, keyed by
/// card and transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEvent {
    pub provider: ProviderKind,
    pub kind: CardEventKind,
    pub card_id: String,
    pub transaction_id: String,
    pub amount: String,
    pub currency: String,
    pub merchant_name: String,
    pub merchant_category: String,
    pub status: String,
    pub decline_reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DepositReceived,
    TransferCompleted,
    TransferFailed,
    KycStatusChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepositReceived => "deposit_received",
            Self::TransferCompleted => "transfer_completed",
            Self::TransferFailed => "transfer_failed",
            Self::KycStatusChanged => "kyc_status_changed",
        }
    }
}

/// Best-effort message to the party affected by an event.
///
/// `subject_id` identifies the account, transfer or customer; resolving it to
/// a user is the notifier's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub provider: ProviderKind,
    pub subject_id: String,
    pub amount: String,
    pub currency: String,
    pub detail: String,
}

// ============================================================================
// Capabilities
// ============================================================================

#[async_trait]
pub trait DepositLedger: Send + Sync {
    async fn credit_deposit(&self, deposit: &DepositCredit) -> Result<(), DownstreamError>;
}

#[async_trait]
pub trait TransferLedger: Send + Sync {
    async fn update_transfer_status(
        &self,
        update: &TransferStatusUpdate,
    ) -> Result<(), DownstreamError>;
}

#[async_trait]
pub trait CustomerRegistry: Send + Sync {
    async fn update_customer_status(
        &self,
        update: &CustomerStatusUpdate,
    ) -> Result<(), DownstreamError>;
}

#[async_trait]
pub trait CardProcessor: Send + Sync {
    async fn process_card_event(&self, event: &CardEvent) -> Result<(), DownstreamError>;
}

/// Notification dispatch. Failures never fail the webhook.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), DownstreamError>;
}

/// The downstream capabilities one adapter may call.
#[derive(Clone)]
pub struct Collaborators {
    pub deposits: Arc<dyn DepositLedger>,
    pub transfers: Arc<dyn TransferLedger>,
    pub customers: Arc<dyn CustomerRegistry>,
    pub cards: Arc<dyn CardProcessor>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    pub fn new(
        deposits: Arc<dyn DepositLedger>,
        transfers: Arc<dyn TransferLedger>,
        customers: Arc<dyn CustomerRegistry>,
        cards: Arc<dyn CardProcessor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            deposits,
            transfers,
            customers,
            cards,
            notifier,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
