//! End-to-end webhook scenarios through the HTTP router.

mod common;

use axum::http::StatusCode;
use common::*;
use railhook_core::{Chain, ProviderKind, TransferStatus, WebhookSecret};
use serde_json::json;
use tower::ServiceExt;

// ============================================================================
// Bridge
// ============================================================================

/// A valid, known deposit credits the ledger exactly once.
#[tokio::test]
async fn test_bridge_deposit_is_credited_once() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);

    let response = app
        .oneshot(signed_request(ProviderKind::Bridge, &bridge_deposit_received()))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["event_id"], "wh_evt_1");

    let deposits = ledger.applied_deposits();
    assert_eq!(ledger.deposit_calls(), 1);
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].amount, "250.75");
    assert_eq!(deposits[0].currency, "usd");
    assert_eq!(deposits[0].reference, "tx_ref_001");
    assert_eq!(deposits[0].account_id, "va_123");
    assert_eq!(ledger.notification_count(), 1);
}

/// The same payload with a wrong signature is rejected before any call.
#[tokio::test]
async fn test_bridge_invalid_signature_is_rejected() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);
    let body = serde_json::to_vec(&bridge_deposit_received()).unwrap();
    let signature = sign("not-the-bridge-secret", &body);

    let response = app
        .oneshot(raw_request(ProviderKind::Bridge, Some(&signature), body))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid signature");
    assert_eq!(ledger.downstream_calls(), 0);
}

/// An unknown event type is acknowledged without a downstream call.
#[tokio::test]
async fn test_bridge_unknown_event_type_is_ignored() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);
    let payload = bridge_event("virtual_account.created", json!({}));

    let response = app
        .oneshot(signed_request(ProviderKind::Bridge, &payload))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
    assert_eq!(ledger.downstream_calls(), 0);
}

/// "Already processed" from the ledger is an idempotent success on the
/// first call, with no retry and no second notification.
#[tokio::test]
async fn test_already_processed_is_success_without_retry() {
    let ledger = FakeLedger::new();
    ledger.fail_next(&["deposit tx_ref_001 already processed"]);
    let app = build_app(test_config(), &ledger);

    let response = app
        .oneshot(signed_request(ProviderKind::Bridge, &bridge_deposit_received()))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(ledger.deposit_calls(), 1);
    assert_eq!(ledger.notification_count(), 0);
}

#[tokio::test]
async fn test_bridge_signature_with_prefix_is_accepted() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);
    let body = serde_json::to_vec(&bridge_deposit_received()).unwrap();
    let signature = format!("sha256={}", sign(BRIDGE_SECRET, &body));

    let response = app
        .oneshot(raw_request(ProviderKind::Bridge, Some(&signature), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ledger.deposit_calls(), 1);
}

#[tokio::test]
async fn test_bridge_declined_card_is_acknowledged() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);
    let payload = bridge_event(
        "card.transaction.declined",
        json!({ "transaction_id": "ctx_1", "decline_reason": "insufficient_funds" }),
    );

    let response = app
        .oneshot(signed_request(ProviderKind::Bridge, &payload))
        .await
        .unwrap();

    let (_, body) = read_json(response).await;
    assert_eq!(body["status"], "acknowledged");
    let cards = ledger.cards.lock().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].decline_reason, "insufficient_funds");
}

// ============================================================================
// Secrets
// ============================================================================

#[tokio::test]
async fn test_provider_secrets_are_not_interchangeable() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);
    let body = serde_json::to_vec(&due_transfer("transfer.completed", "tf_1")).unwrap();
    let signature = sign(BRIDGE_SECRET, &body);

    let response = app
        .oneshot(raw_request(ProviderKind::Due, Some(&signature), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_secret_accepts_unsigned_requests() {
    let ledger = FakeLedger::new();
    let mut config = test_config();
    config.providers.due.webhook_secret = WebhookSecret::disabled();
    let app = build_app(config, &ledger);
    let body = serde_json::to_vec(&due_transfer("transfer.completed", "tf_2")).unwrap();

    let response = app
        .oneshot(raw_request(ProviderKind::Due, None, body))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}

// ============================================================================
// Due and Circle
// ============================================================================

#[tokio::test]
async fn test_due_transfer_failed_is_acknowledged() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);

    let response = app
        .oneshot(signed_request(
            ProviderKind::Due,
            &due_transfer("transfer.failed", "tf_3"),
        ))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "acknowledged");
    assert_eq!(body["event_id"], "transfer.failed:tf_3");
    let transfers = ledger.transfers.lock().unwrap();
    assert_eq!(transfers[0].status, TransferStatus::Failed);
    assert_eq!(transfers[0].amount, "100");
}

#[tokio::test]
async fn test_due_data_must_be_an_object() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);
    let payload = json!({ "type": "transfer.completed", "data": "tf_4" });

    let response = app
        .oneshot(signed_request(ProviderKind::Due, &payload))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid payload");
}

#[tokio::test]
async fn test_circle_onchain_deposit_is_credited() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);

    let response = app
        .oneshot(signed_request(
            ProviderKind::Circle,
            &circle_transfer("transfers.completed", "blockchain"),
        ))
        .await
        .unwrap();

    let (_, body) = read_json(response).await;
    assert_eq!(body["status"], "success");
    let deposits = ledger.applied_deposits();
    assert_eq!(deposits[0].reference, "ct_55");
    assert_eq!(deposits[0].transaction_hash, "5sigHash");
    assert_eq!(deposits[0].account_id, "wallet_1");
    assert_eq!(deposits[0].chain, Some(Chain::Solana));
}

#[tokio::test]
async fn test_circle_wallet_transfer_makes_no_call() {
    let ledger = FakeLedger::new();
    let app = build_app(test_config(), &ledger);

    let response = app
        .oneshot(signed_request(
            ProviderKind::Circle,
            &circle_transfer("transfers.completed", "wallet"),
        ))
        .await
        .unwrap();

    let (_, body) = read_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(ledger.downstream_calls(), 0);
}

// ============================================================================
// Retry behaviour at the HTTP boundary
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_then_succeed() {
    let ledger = FakeLedger::new();
    ledger.fail_next(&["connection refused", "service temporarily unavailable"]);
    let app = build_app(test_config(), &ledger);

    let response = app
        .oneshot(signed_request(ProviderKind::Bridge, &bridge_deposit_received()))
        .await
        .unwrap();

    let (_, body) = read_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(ledger.deposit_calls(), 3);
    assert_eq!(ledger.applied_deposits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_are_acknowledged_with_error() {
    let ledger = FakeLedger::new();
    ledger.fail_always("upstream timeout");
    let app = build_app(test_config(), &ledger);

    let response = app
        .oneshot(signed_request(ProviderKind::Bridge, &bridge_deposit_received()))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("upstream timeout"));
    assert_eq!(ledger.deposit_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout_bounds_the_retry_budget() {
    let ledger = FakeLedger::new();
    ledger.fail_always("network unreachable");
    let mut config = test_config();
    config.server.request_timeout_seconds = 1;
    let app = build_app(config, &ledger);

    let response = app
        .oneshot(signed_request(ProviderKind::Bridge, &bridge_deposit_received()))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    // Calls at 0ms and 500ms; the next retry would start past the 1s deadline.
    assert_eq!(ledger.deposit_calls(), 2);
}

#[tokio::test]
async fn test_terminal_failure_is_not_retried() {
    let ledger = FakeLedger::new();
    ledger.fail_next(&["invalid amount"]);
    let app = build_app(test_config(), &ledger);

    let response = app
        .oneshot(signed_request(ProviderKind::Bridge, &bridge_deposit_received()))
        .await
        .unwrap();

    let (_, body) = read_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(ledger.deposit_calls(), 1);
    assert_eq!(ledger.notification_count(), 0);
}
