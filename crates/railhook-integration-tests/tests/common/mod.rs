//! Common test utilities for railhook integration tests
//!
//! This module provides:
//! - A recording, idempotent fake ledger implementing every downstream trait
//! - Router construction from a [`ServiceConfig`]
//! - Signed request and payload builders

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use railhook_api::{create_router, AppState, ProviderRegistry, ServiceConfig, ServiceMetrics};
use railhook_core::{
    signature::compute_signature, CardEvent, CardProcessor, Collaborators, CustomerRegistry,
    CustomerStatusUpdate, DepositCredit, DepositLedger, DownstreamError, Notification, Notifier,
    ProviderKind, RetryExecutor, TransferLedger, TransferStatusUpdate, WebhookSecret,
};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub const BRIDGE_SECRET: &str = "whsec_bridge_test";
pub const DUE_SECRET: &str = "whsec_due_test";
pub const CIRCLE_SECRET: &str = "whsec_circle_test";

// ============================================================================
// Fake ledger
// ============================================================================

/// Fake of every downstream capability.
///
/// Deposits are idempotent on their reference the way a real ledger is: the
/// first credit applies, later credits fail with "already processed".
/// Scripted failures are returned before that check.
#[derive(Default)]
pub struct FakeLedger {
    /// Every deposit call, applied or not
    pub deposit_calls: Mutex<Vec<DepositCredit>>,
    /// Deposits whose effect was applied
    pub applied_deposits: Mutex<Vec<DepositCredit>>,
    pub transfers: Mutex<Vec<TransferStatusUpdate>>,
    pub customers: Mutex<Vec<CustomerStatusUpdate>>,
    pub cards: Mutex<Vec<CardEvent>>,
    pub notifications: Mutex<Vec<Notification>>,
    seen_references: Mutex<HashSet<String>>,
    failures: Mutex<VecDeque<String>>,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next downstream calls with these messages, in order.
    pub fn fail_next(&self, messages: &[&str]) {
        self.failures
            .lock()
            .unwrap()
            .extend(messages.iter().map(|m| m.to_string()));
    }

    /// Fail every downstream call with `message`.
    pub fn fail_always(&self, message: &str) {
        self.fail_next(&vec![message; 64]);
    }

    pub fn deposit_calls(&self) -> usize {
        self.deposit_calls.lock().unwrap().len()
    }

    pub fn applied_deposits(&self) -> Vec<DepositCredit> {
        self.applied_deposits.lock().unwrap().clone()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn downstream_calls(&self) -> usize {
        self.deposit_calls()
            + self.transfers.lock().unwrap().len()
            + self.customers.lock().unwrap().len()
            + self.cards.lock().unwrap().len()
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators::new(
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    fn scripted_failure(&self) -> Result<(), DownstreamError> {
        match self.failures.lock().unwrap().pop_front() {
            Some(message) => Err(DownstreamError::new(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DepositLedger for FakeLedger {
    async fn credit_deposit(&self, deposit: &DepositCredit) -> Result<(), DownstreamError> {
        self.deposit_calls.lock().unwrap().push(deposit.clone());
        self.scripted_failure()?;

        if !self
            .seen_references
            .lock()
            .unwrap()
            .insert(deposit.reference.clone())
        {
            return Err(DownstreamError::new(format!(
                "deposit {} already processed",
                deposit.reference
            )));
        }
        self.applied_deposits.lock().unwrap().push(deposit.clone());
        Ok(())
    }
}

#[async_trait]
impl TransferLedger for FakeLedger {
    async fn update_transfer_status(
        &self,
        update: &TransferStatusUpdate,
    ) -> Result<(), DownstreamError> {
        self.transfers.lock().unwrap().push(update.clone());
        self.scripted_failure()
    }
}

#[async_trait]
impl CustomerRegistry for FakeLedger {
    async fn update_customer_status(
        &self,
        update: &CustomerStatusUpdate,
    ) -> Result<(), DownstreamError> {
        self.customers.lock().unwrap().push(update.clone());
        self.scripted_failure()
    }
}

#[async_trait]
impl CardProcessor for FakeLedger {
    async fn process_card_event(&self, event: &CardEvent) -> Result<(), DownstreamError> {
        self.cards.lock().unwrap().push(event.clone());
        self.scripted_failure()
    }
}

#[async_trait]
impl Notifier for FakeLedger {
    async fn notify(&self, notification: &Notification) -> Result<(), DownstreamError> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// ============================================================================
// App construction
// ============================================================================

/// Default configuration with a distinct secret per provider.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.providers.bridge.webhook_secret = WebhookSecret::new(BRIDGE_SECRET);
    config.providers.due.webhook_secret = WebhookSecret::new(DUE_SECRET);
    config.providers.circle.webhook_secret = WebhookSecret::new(CIRCLE_SECRET);
    config
}

/// Build the router the service would build from `config`.
pub fn build_app(config: ServiceConfig, ledger: &Arc<FakeLedger>) -> Router {
    let executor = Arc::new(RetryExecutor::new(
        config.retry.to_retry_policy(),
        config.retry.to_classifier(),
    ));
    let registry =
        ProviderRegistry::from_config(&config.providers, ledger.collaborators(), executor);
    let metrics = ServiceMetrics::new().unwrap();
    create_router(AppState::new(config, registry, metrics))
}

// ============================================================================
// Requests
// ============================================================================

pub fn secret_for(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Bridge => BRIDGE_SECRET,
        ProviderKind::Due => DUE_SECRET,
        ProviderKind::Circle => CIRCLE_SECRET,
    }
}

pub fn signature_header(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Bridge => "Bridge-Signature",
        ProviderKind::Due => "X-Due-Signature",
        ProviderKind::Circle => "X-Circle-Signature",
    }
}

pub fn sign(secret: &str, body: &[u8]) -> String {
    compute_signature(secret, body).unwrap()
}

/// POST `payload` to the provider's endpoint, signed with its secret.
pub fn signed_request(provider: ProviderKind, payload: &Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = sign(secret_for(provider), &body);
    raw_request(provider, Some(&signature), body)
}

pub fn raw_request(provider: ProviderKind, signature: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/webhooks/{provider}"))
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(signature_header(provider), signature);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ============================================================================
// Payloads
// ============================================================================

pub fn bridge_event(event_type: &str, event_object: Value) -> Value {
    json!({
        "api_version": "v0",
        "event_id": "wh_evt_1",
        "event_category": event_type.split('.').next().unwrap_or(""),
        "event_type": event_type,
        "event_object_id": "va_123",
        "event_object_status": "completed",
        "event_object": event_object,
        "event_created_at": "2024-05-01T12:00:00Z"
    })
}

pub fn bridge_deposit_received() -> Value {
    bridge_event(
        "virtual_account.deposit.received",
        json!({
            "amount": "250.75",
            "currency": "usd",
            "transaction_ref": "tx_ref_001",
            "customer_id": "cus_9"
        }),
    )
}

pub fn due_transfer(event_type: &str, transfer_id: &str) -> Value {
    json!({
        "type": event_type,
        "timestamp": "2024-06-01T08:00:00Z",
        "data": {
            "id": transfer_id,
            "ownerId": "acct_7",
            "status": "payment_processed",
            "source": { "amount": "100", "currency": "USDC", "rail": "ethereum" },
            "destination": { "amount": "91.40", "currency": "EUR", "rail": "sepa" }
        }
    })
}

pub fn circle_transfer(notification_type: &str, source_type: &str) -> Value {
    json!({
        "notificationType": notification_type,
        "transferId": "ct_55",
        "transfer": {
            "id": "ct_55",
            "source": { "type": source_type, "chain": "SOL", "address": "So1From" },
            "destination": { "type": "wallet", "id": "wallet_1" },
            "amount": { "amount": "42.00", "currency": "USD" },
            "transactionHash": "5sigHash",
            "status": "complete",
            "createDate": "2024-07-01T00:00:00Z"
        }
    })
}
