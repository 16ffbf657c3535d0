//! # Railhook HTTP Service
//!
//! HTTP server receiving payment-rail webhooks and running them through the
//! Railhook processing pipeline.
//!
//! This service provides:
//! - `POST /webhooks/{provider}` for Bridge, Due and Circle
//! - `GET /health` for liveness checks
//! - `GET /metrics` in the Prometheus text format
//!
//! Every request that passes signature verification and parsing is answered
//! with `200 OK`; the body's `status` field tells the provider what happened.
//! Only authentication failures (`401`) and parse failures (`400`) ask the
//! provider to treat the delivery as rejected.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod provider_registry;
pub mod responses;

#[cfg(test)]
mod test_support;

pub use config::{
    LoggingConfig, ProviderConfig, ProvidersConfig, RetryConfig, ServerConfig, ServiceConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use provider_registry::ProviderRegistry;
pub use responses::{HealthResponse, WebhookResponse};

use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use railhook_core::{
    process_webhook, Acknowledgment, ExecutionContext, ProviderKind, RawWebhookRequest,
    Timestamp, WebhookError, WebhookProvider,
};
use std::{future::IntoFuture, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Adapters for the enabled providers
    pub registry: ProviderRegistry,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        registry: ProviderRegistry,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route("/webhooks/{provider}", post(handle_webhook))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size));

    let observability_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(webhook_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Serves until SIGINT or SIGTERM, then stops accepting connections and
/// waits up to `server.shutdown_timeout_seconds` for in-flight requests.
/// Requests still running after that are dropped, which cancels their
/// pending retries.
pub async fn start_server(
    config: ServiceConfig,
    registry: ProviderRegistry,
) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(ConfigError::from)?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = config.server.shutdown_timeout();
    let providers = registry.kinds();

    let app = create_router(AppState::new(config, registry, metrics));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, providers = ?providers, "Starting HTTP server");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!(
            timeout_seconds = shutdown_timeout.as_secs(),
            "Initiating graceful shutdown"
        );
        signal_token.cancel();
    });

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; dropping in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Handle `POST /webhooks/{provider}`
///
/// The request runs under an [`ExecutionContext`] whose deadline is
/// `server.request_timeout_seconds` from now. The context's cancellation
/// token fires when this future is dropped, so a client disconnect stops
/// any pending retry backoff.
#[instrument(skip(state, headers, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    let Some(processor) = state.registry.get(&provider) else {
        return Err(WebhookHandlerError::ProviderNotFound { provider });
    };
    let kind = processor.kind();
    let started = Instant::now();

    let cancellation = CancellationToken::new();
    let _cancel_on_drop = cancellation.clone().drop_guard();
    let ctx = ExecutionContext::with_cancellation(cancellation)
        .with_timeout(state.config.server.request_timeout());

    let outcome = run_pipeline(&state, processor.as_ref(), kind, &headers, body, &ctx).await;

    let label = match &outcome {
        Ok(ack) => ack.result.status(),
        Err(e) => e.outcome_label(),
    };
    state
        .metrics
        .record_webhook_request(kind, label, started.elapsed());
    if let Err(WebhookHandlerError::ProcessingFailed(WebhookError::InvalidSignature { .. })) =
        &outcome
    {
        state.metrics.record_signature_failure(kind);
    }

    Ok(Json(WebhookResponse::from(outcome?)))
}

async fn run_pipeline(
    state: &AppState,
    processor: &dyn WebhookProvider,
    kind: ProviderKind,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
    ctx: &ExecutionContext,
) -> Result<Acknowledgment, WebhookHandlerError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            WebhookHandlerError::PayloadTooLarge {
                max_size: state.config.server.max_body_size,
            }
        } else {
            warn!(error = %rejection.body_text(), "Failed to read webhook body");
            WebhookHandlerError::ProcessingFailed(WebhookError::InvalidBody {
                message: rejection.body_text(),
            })
        }
    })?;

    let header_pairs = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));
    let request = RawWebhookRequest::new(kind, header_pairs, body);

    Ok(process_webhook(processor, &request, ctx).await?)
}

// ============================================================================
// Health and Metrics
// ============================================================================

/// Basic health check endpoint
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: state.registry.kinds(),
    })
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, WebhookHandlerError> {
    state
        .metrics
        .encode()
        .map_err(|e| WebhookHandlerError::InternalError {
            message: format!("failed to encode metrics: {e}"),
        })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID support
///
/// - Uses the caller's `x-correlation-id` or generates a UUID v4
/// - Records it on the request span, which handler spans inherit
/// - Echoes it in the response headers
/// - Logs completion at a level matching the status class
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    let mut response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(status = %status, duration_ms = %duration_ms, "Request completed with server error");
    } else if status.is_client_error() {
        warn!(status = %status, duration_ms = %duration_ms, "Request completed with client error");
    } else {
        info!(status = %status, duration_ms = %duration_ms, "Request completed");
    }

    response
}

/// Header carrying the per-request correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
