//! Downstream collaborators used when no ledger backend is wired in.
//!
//! Every call is logged at `info!` and reported as applied. This keeps the
//! binary runnable end to end (signature checks, decoding, routing, retry)
//! against provider sandboxes before a real ledger is connected.

use async_trait::async_trait;
use railhook_core::{
    CardEvent, CardProcessor, Collaborators, CustomerRegistry, CustomerStatusUpdate,
    DepositCredit, DepositLedger, DownstreamError, Notification, Notifier, TransferLedger,
    TransferStatusUpdate,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
pub struct LoggingDownstream;

impl LoggingDownstream {
    pub fn collaborators() -> Collaborators {
        let downstream = Arc::new(Self);
        Collaborators::new(
            downstream.clone(),
            downstream.clone(),
            downstream.clone(),
            downstream.clone(),
            downstream,
        )
    }
}

#[async_trait]
impl DepositLedger for LoggingDownstream {
    async fn credit_deposit(&self, deposit: &DepositCredit) -> Result<(), DownstreamError> {
        info!(
            provider = %deposit.provider,
            reference = %deposit.reference,
            account_id = %deposit.account_id,
            customer_id = %deposit.customer_id,
            amount = %deposit.amount,
            currency = %deposit.currency,
            chain = deposit.chain.as_ref().map(|c| c.as_str()).unwrap_or(""),
            transaction_hash = %deposit.transaction_hash,
            "credit_deposit"
        );
        Ok(())
    }
}

#[async_trait]
impl TransferLedger for LoggingDownstream {
    async fn update_transfer_status(
        &self,
        update: &TransferStatusUpdate,
    ) -> Result<(), DownstreamError> {
        info!(
            provider = %update.provider,
            transfer_id = %update.transfer_id,
            status = update.status.as_str(),
            reason = %update.reason,
            "update_transfer_status"
        );
        Ok(())
    }
}

#[async_trait]
impl CustomerRegistry for LoggingDownstream {
    async fn update_customer_status(
        &self,
        update: &CustomerStatusUpdate,
    ) -> Result<(), DownstreamError> {
        info!(
            provider = %update.provider,
            customer_id = %update.customer_id,
            status = %update.status,
            event_type = %update.event_type,
            "update_customer_status"
        );
        Ok(())
    }
}

#[async_trait]
impl CardProcessor for LoggingDownstream {
    async fn process_card_event(&self, event: &CardEvent) -> Result<(), DownstreamError> {
        info!(
            provider = %event.provider,
            kind = event.kind.as_str(),
            card_id = %event.card_id,
            transaction_id = %event.transaction_id,
            status = %event.status,
            "process_card_event"
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for LoggingDownstream {
    async fn notify(&self, notification: &Notification) -> Result<(), DownstreamError> {
        info!(
            kind = notification.kind.as_str(),
            provider = %notification.provider,
            subject_id = %notification.subject_id,
            "notify"
        );
        Ok(())
    }
}
