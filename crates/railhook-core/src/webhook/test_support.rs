//! Recording collaborators shared by the adapter and dispatcher tests.

use super::EventDispatcher;
use crate::downstream::*;
use crate::signature::compute_signature;
use crate::{ErrorClassifier, RetryExecutor, RetryPolicy};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const SECRET: &str = "test-webhook-secret";

pub(crate) fn sign(body: &[u8]) -> String {
    compute_signature(SECRET, body).unwrap()
}

/// Records every successful downstream call and replays scripted failures.
#[derive(Default)]
pub(crate) struct Recorder {
    pub deposits: Mutex<Vec<DepositCredit>>,
    pub transfers: Mutex<Vec<TransferStatusUpdate>>,
    pub customers: Mutex<Vec<CustomerStatusUpdate>>,
    pub cards: Mutex<Vec<CardEvent>>,
    pub notifications: Mutex<Vec<Notification>>,
    failures: Mutex<VecDeque<String>>,
    notify_failure: Mutex<Option<String>>,
    calls: AtomicU32,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next mutating calls fail with these messages, in order.
    pub fn fail_next(&self, messages: &[&str]) {
        let mut failures = self.failures.lock().unwrap();
        failures.extend(messages.iter().map(|m| m.to_string()));
    }

    pub fn fail_notifications(&self, message: &str) {
        *self.notify_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Mutating calls made, successful or not.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
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

    pub fn dispatcher(self: &Arc<Self>) -> EventDispatcher {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50), 2.0);
        EventDispatcher::new(
            self.collaborators(),
            Arc::new(RetryExecutor::new(policy, ErrorClassifier::default())),
        )
    }

    fn next_call(&self) -> Result<(), DownstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(message) => Err(DownstreamError::new(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DepositLedger for Recorder {
    async fn credit_deposit(&self, deposit: &DepositCredit) -> Result<(), DownstreamError> {
        self.next_call()?;
        self.deposits.lock().unwrap().push(deposit.clone());
        Ok(())
    }
}

#[async_trait]
impl TransferLedger for Recorder {
    async fn update_transfer_status(
        &self,
        update: &TransferStatusUpdate,
    ) -> Result<(), DownstreamError> {
        self.next_call()?;
        self.transfers.lock().unwrap().push(update.clone());
        Ok(())
    }
}

#[async_trait]
impl CustomerRegistry for Recorder {
    async fn update_customer_status(
        &self,
        update: &CustomerStatusUpdate,
    ) -> Result<(), DownstreamError> {
        self.next_call()?;
        self.customers.lock().unwrap().push(update.clone());
        Ok(())
    }
}

#[async_trait]
impl CardProcessor for Recorder {
    async fn process_card_event(&self, event: &CardEvent) -> Result<(), DownstreamError> {
        self.next_call()?;
        self.cards.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(&self, notification: &Notification) -> Result<(), DownstreamError> {
        if let Some(message) = self.notify_failure.lock().unwrap().clone() {
            return Err(DownstreamError::new(message));
        }
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
