//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use railhook_core::{RetryPolicyError, WebhookError};
use tracing::{error, warn};

/// Webhook handler errors with HTTP status code mapping
///
/// Only requests that the provider must not redeliver unchanged end up here.
/// Business failures after a successful parse are acknowledged with `200`
/// and never reach this type.
///
/// - `401 Unauthorized`: signature missing or wrong
/// - `400 Bad Request`: body unreadable or not the expected JSON shape
/// - `404 Not Found`: provider slug unknown or disabled
/// - `413 Payload Too Large`: body exceeds `server.max_body_size`
/// - `500 Internal Server Error`: unexpected server failures
///
/// Response bodies carry a short fixed message; details stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Verification or parse failure from the processing pipeline
    ///
    /// Maps to:
    /// - `401 Unauthorized` for [`WebhookError::InvalidSignature`]
    /// - `400 Bad Request` for [`WebhookError::InvalidBody`] and
    ///   [`WebhookError::MalformedPayload`]
    #[error("Processing failed: {0}")]
    ProcessingFailed(#[from] WebhookError),

    /// Webhook provider not found in the registry
    ///
    /// Maps to: `404 Not Found`
    #[error("Webhook provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// Payload too large
    ///
    /// Maps to: `413 Payload Too Large`
    #[error("Payload too large (max: {max_size} bytes)")]
    PayloadTooLarge { max_size: usize },

    /// Unexpected internal server error
    ///
    /// Maps to: `500 Internal Server Error`. A generic message is returned
    /// to the client.
    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl WebhookHandlerError {
    /// HTTP status returned for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProcessingFailed(WebhookError::InvalidSignature { .. }) => {
                StatusCode::UNAUTHORIZED
            }
            Self::ProcessingFailed(_) => StatusCode::BAD_REQUEST,
            Self::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `error` field of the response body.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::ProcessingFailed(WebhookError::InvalidSignature { .. }) => "invalid signature",
            Self::ProcessingFailed(WebhookError::InvalidBody { .. }) => "invalid body",
            Self::ProcessingFailed(WebhookError::MalformedPayload { .. }) => "invalid payload",
            Self::ProviderNotFound { .. } => "unknown provider",
            Self::PayloadTooLarge { .. } => "payload too large",
            Self::InternalError { .. } => "internal server error",
        }
    }

    /// Label used for the `outcome` dimension of request metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::ProcessingFailed(WebhookError::InvalidSignature { .. }) => "invalid_signature",
            Self::ProcessingFailed(WebhookError::InvalidBody { .. }) => "invalid_body",
            Self::ProcessingFailed(WebhookError::MalformedPayload { .. }) => "invalid_payload",
            Self::ProviderNotFound { .. } => "unknown_provider",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::InternalError { .. } => "internal_error",
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::InternalError { message } => {
                error!(error = %message, "Internal server error occurred");
            }
            Self::PayloadTooLarge { max_size } => {
                warn!(max_size = max_size, "Payload too large");
            }
            Self::ProviderNotFound { provider } => {
                warn!(provider = %provider, "Webhook provider not found");
            }
            // Logged by the pipeline at the point of failure.
            Self::ProcessingFailed(_) => {}
        }

        let body = serde_json::json!({
            "error": self.public_message(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Invalid retry configuration: {0}")]
    Retry(#[from] RetryPolicyError),

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
