//! Shared dispatch of routed events to downstream collaborators.
//!
//! Every mutating call goes through the [`RetryExecutor`]; every provider
//! adapter uses the same [`EventDispatcher`], so retry and idempotency
//! behaviour does not depend on which rail sent the event.

use super::DispatchResult;
use crate::downstream::{
    CardEvent, CardEventKind, Collaborators, CustomerStatusUpdate, DepositCredit, Notification,
    NotificationKind, TransferStatus, TransferStatusUpdate,
};
use crate::executor::{ExecutionContext, ExecutionError, ExecutionOutcome, RetryExecutor};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Calls downstream collaborators on behalf of the provider adapters.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    collaborators: Collaborators,
    executor: Arc<RetryExecutor>,
}

impl EventDispatcher {
    pub fn new(collaborators: Collaborators, executor: Arc<RetryExecutor>) -> Self {
        Self {
            collaborators,
            executor,
        }
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Credit a deposit, keyed by its reference.
    pub async fn credit_deposit(
        &self,
        ctx: &ExecutionContext,
        credit: DepositCredit,
    ) -> DispatchResult {
        if credit.reference.is_empty() {
            return missing_key("credit_deposit", "deposit reference");
        }

        let deposits = &self.collaborators.deposits;
        let credit = &credit;
        let result = self
            .executor
            .execute("credit_deposit", ctx, move || deposits.credit_deposit(credit))
            .await;

        let outcome = match settle("credit_deposit", result) {
            Ok(outcome) => outcome,
            Err(failure) => return failure,
        };

        info!(
            reference = %credit.reference,
            account_id = %credit.account_id,
            amount = %credit.amount,
            currency = %credit.currency,
            attempts = outcome.attempts(),
            "Deposit credited"
        );

        if !outcome.is_already_processed() {
            self.notify(Notification {
                kind: NotificationKind::DepositReceived,
                provider: credit.provider,
                subject_id: credit.account_id.clone(),
                amount: credit.amount.clone(),
                currency: credit.currency.clone(),
                detail: credit.reference.clone(),
            })
            .await;
        }

        DispatchResult::Processed
    }

    /// Record a transfer's final state.
    ///
    /// Completed transfers are `Processed`; failed ones are `Acknowledged`.
    pub async fn update_transfer(
        &self,
        ctx: &ExecutionContext,
        update: TransferStatusUpdate,
    ) -> DispatchResult {
        if update.transfer_id.is_empty() {
            return missing_key("update_transfer_status", "transfer id");
        }

        let transfers = &self.collaborators.transfers;
        let update = &update;
        let result = self
            .executor
            .execute("update_transfer_status", ctx, move || {
                transfers.update_transfer_status(update)
            })
            .await;

        let outcome = match settle("update_transfer_status", result) {
            Ok(outcome) => outcome,
            Err(failure) => return failure,
        };

        let (kind, dispatched) = match update.status {
            TransferStatus::Completed => {
                info!(transfer_id = %update.transfer_id, amount = %update.amount, "Transfer completed");
                (NotificationKind::TransferCompleted, DispatchResult::Processed)
            }
            TransferStatus::Failed => {
                warn!(transfer_id = %update.transfer_id, reason = %update.reason, "Transfer failed");
                (NotificationKind::TransferFailed, DispatchResult::Acknowledged)
            }
        };

        if !outcome.is_already_processed() {
            self.notify(Notification {
                kind,
                provider: update.provider,
                subject_id: update.transfer_id.clone(),
                amount: update.amount.clone(),
                currency: update.currency.clone(),
                detail: update.reason.clone(),
            })
            .await;
        }

        dispatched
    }

    /// Apply a customer or KYC status change.
    pub async fn update_customer(
        &self,
        ctx: &ExecutionContext,
        update: CustomerStatusUpdate,
    ) -> DispatchResult {
        if update.customer_id.is_empty() {
            return missing_key("update_customer_status", "customer id");
        }

        let customers = &self.collaborators.customers;
        let update = &update;
        let result = self
            .executor
            .execute("update_customer_status", ctx, move || {
                customers.update_customer_status(update)
            })
            .await;

        let outcome = match settle("update_customer_status", result) {
            Ok(outcome) => outcome,
            Err(failure) => return failure,
        };

        info!(customer_id = %update.customer_id, status = %update.status, "Customer status updated");

        if !outcome.is_already_processed() {
            self.notify(Notification {
                kind: NotificationKind::KycStatusChanged,
                provider: update.provider,
                subject_id: update.customer_id.clone(),
                amount: String::new(),
                currency: String::new(),
                detail: update.status.clone(),
            })
            .await;
        }

        DispatchResult::Processed
    }

    /// Forward a card event. Declines are `Acknowledged`.
    pub async fn card_event(&self, ctx: &ExecutionContext, event: CardEvent) -> DispatchResult {
        if event.card_id.is_empty() {
            return missing_key("process_card_event", "card id");
        }

        let cards = &self.collaborators.cards;
        let event = &event;
        let result = self
            .executor
            .execute("process_card_event", ctx, move || cards.process_card_event(event))
            .await;

        if let Err(failure) = settle("process_card_event", result) {
            return failure;
        }

        info!(
            card_id = %event.card_id,
            transaction_id = %event.transaction_id,
            kind = event.kind.as_str(),
            "Card event processed"
        );

        match event.kind {
            CardEventKind::Declined => DispatchResult::Acknowledged,
            _ => DispatchResult::Processed,
        }
    }

    /// Best-effort notification: one call, failures logged and ignored.
    pub async fn notify(&self, notification: Notification) {
        match self.collaborators.notifier.notify(&notification).await {
            Ok(()) => debug!(
                kind = notification.kind.as_str(),
                subject_id = %notification.subject_id,
                "Notification sent"
            ),
            Err(e) => warn!(
                kind = notification.kind.as_str(),
                subject_id = %notification.subject_id,
                error = %e,
                "Notification failed - continuing"
            ),
        }
    }
}

/// Map an execution result onto the acknowledgment contract.
fn settle(
    operation: &str,
    result: Result<ExecutionOutcome, ExecutionError>,
) -> Result<ExecutionOutcome, DispatchResult> {
    match result {
        Ok(outcome) => {
            if outcome.is_already_processed() {
                info!(operation, "Event already processed - idempotent no-op");
            }
            Ok(outcome)
        }
        Err(e) => {
            error!(
                operation,
                attempts = e.attempts(),
                category = e.category().as_str(),
                error = %e,
                "Downstream operation failed"
            );
            Err(DispatchResult::AcknowledgedWithError {
                message: e.to_string(),
            })
        }
    }
}

fn missing_key(operation: &str, key: &str) -> DispatchResult {
    error!(operation, key, "Event is missing its idempotency key - not dispatched");
    DispatchResult::AcknowledgedWithError {
        message: format!("missing {key}"),
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
