//! Recording downstream collaborators shared by the unit tests.

use async_trait::async_trait;
use railhook_core::{
    signature::compute_signature, CardEvent, CardProcessor, Collaborators, CustomerRegistry,
    CustomerStatusUpdate, DepositCredit, DepositLedger, DownstreamError, ErrorClassifier,
    Notification, Notifier, RetryExecutor, RetryPolicy, TransferLedger, TransferStatusUpdate,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET: &str = "api-test-secret";

pub fn sign(body: &[u8]) -> String {
    compute_signature(SECRET, body).unwrap()
}

/// Records every call as `"<operation>:<key>"` and replays scripted failures.
#[derive(Default)]
pub struct FakeDownstream {
    pub calls: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<String>>,
}

impl FakeDownstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, messages: &[&str]) {
        self.failures
            .lock()
            .unwrap()
            .extend(messages.iter().map(|m| m.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
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

    fn record(&self, entry: String) -> Result<(), DownstreamError> {
        self.calls.lock().unwrap().push(entry);
        match self.failures.lock().unwrap().pop_front() {
            Some(message) => Err(DownstreamError::new(message)),
            None => Ok(()),
        }
    }
}

/// Short delays so unpaused tests stay fast.
pub fn fast_executor() -> Arc<RetryExecutor> {
    Arc::new(RetryExecutor::new(
        RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20), 2.0),
        ErrorClassifier::default(),
    ))
}

#[async_trait]
impl DepositLedger for FakeDownstream {
    async fn credit_deposit(&self, credit: &DepositCredit) -> Result<(), DownstreamError> {
        self.record(format!("deposit:{}", credit.reference))
    }
}

#[async_trait]
impl TransferLedger for FakeDownstream {
    async fn update_transfer_status(
        &self,
        update: &TransferStatusUpdate,
    ) -> Result<(), DownstreamError> {
        self.record(format!("transfer:{}", update.transfer_id))
    }
}

#[async_trait]
impl CustomerRegistry for FakeDownstream {
    async fn update_customer_status(
        &self,
        update: &CustomerStatusUpdate,
    ) -> Result<(), DownstreamError> {
        self.record(format!("customer:{}", update.customer_id))
    }
}

#[async_trait]
impl CardProcessor for FakeDownstream {
    async fn process_card_event(&self, event: &CardEvent) -> Result<(), DownstreamError> {
        self.record(format!("card:{}", event.card_id))
    }
}

#[async_trait]
impl Notifier for FakeDownstream {
    async fn notify(&self, notification: &Notification) -> Result<(), DownstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("notify:{}", notification.kind.as_str()));
        Ok(())
    }
}
