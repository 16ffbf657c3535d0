//! HMAC-SHA256 webhook signature verification.
//!
//! Every provider signs the exact raw request body with a shared secret and
//! sends the hex digest in a provider-specific header. Verification always
//! runs over the bytes as received; the parsed form is never re-serialized
//! for this purpose.
//!
//! An empty secret means verification is disabled for that provider. This is
//! an operational escape hatch for non-production environments: the request
//! is accepted and a `WARN` is logged every time the bypass triggers.

use crate::ProviderKind;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, Serializer};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Prefixes providers may put in front of the hex digest.
pub const KNOWN_SIGNATURE_PREFIXES: &[&str] = &["sha256=", "hmac-sha256="];

// ============================================================================
// WebhookSecret
// ============================================================================

/// Shared secret used to sign a provider's webhooks.
///
/// The value is excluded from `Debug` and serialized output and is zeroed
/// when dropped. An empty secret disables verification.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    /// Wrap a raw secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// A secret that disables verification.
    pub fn disabled() -> Self {
        Self(String::new())
    }

    /// `true` when no secret is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw secret value, for immediate use as an HMAC key only.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            f.write_str("WebhookSecret(<disabled>)")
        } else {
            f.write_str("WebhookSecret(<REDACTED>)")
        }
    }
}

impl Serialize for WebhookSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            serializer.serialize_str("")
        } else {
            serializer.serialize_str("<REDACTED>")
        }
    }
}

impl From<&str> for WebhookSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WebhookSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Verification
// ============================================================================

/// Result of checking one request's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The signature matched the digest of the raw body.
    Verified,
    /// No secret is configured; the request is treated as authentic.
    Bypassed,
    /// The signature is missing or does not match.
    Rejected(RejectionReason),
}

impl Verification {
    /// Whether the pipeline may continue to parsing.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Verified | Self::Bypassed)
    }
}

/// Why a signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    MissingSignature,
    Mismatch,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSignature => "missing signature",
            Self::Mismatch => "signature mismatch",
        }
    }
}

/// Per-provider signature verifier.
///
/// Holds the provider's secret for the lifetime of the adapter; the secret is
/// loaded once from configuration and never changes afterwards.
///
/// # Examples
///
/// ```rust
/// use railhook_core::signature::{compute_signature, SignatureVerifier, Verification};
/// use railhook_core::{ProviderKind, WebhookSecret};
///
/// let verifier = SignatureVerifier::new(ProviderKind::Bridge, WebhookSecret::new("s3cret"));
/// let body = br#"{"event_type":"transfer.completed"}"#;
/// let signature = compute_signature("s3cret", body).unwrap();
///
/// assert_eq!(verifier.verify(Some(&signature), body), Verification::Verified);
/// assert!(!verifier.verify(Some("deadbeef"), body).is_accepted());
/// ```
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    provider: ProviderKind,
    secret: WebhookSecret,
}

impl SignatureVerifier {
    pub fn new(provider: ProviderKind, secret: WebhookSecret) -> Self {
        Self { provider, secret }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// `false` when the verification bypass is active.
    pub fn is_enabled(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Check `signature` against the HMAC-SHA256 of `body`.
    ///
    /// Known prefixes (`sha256=`, `hmac-sha256=`) are stripped first and the
    /// hex digests are compared in constant time.
    pub fn verify(&self, signature: Option<&str>, body: &[u8]) -> Verification {
        if self.secret.is_empty() {
            warn!(
                provider = %self.provider,
                "Webhook secret not configured - skipping signature verification"
            );
            return Verification::Bypassed;
        }

        let provided = match signature.map(str::trim) {
            Some(value) if !value.is_empty() => strip_signature_prefix(value),
            _ => return Verification::Rejected(RejectionReason::MissingSignature),
        };

        let Some(expected) = compute_signature(self.secret.expose_secret(), body) else {
            return Verification::Rejected(RejectionReason::Mismatch);
        };

        if signatures_match(&expected, provided) {
            debug!(provider = %self.provider, "Webhook signature verified");
            Verification::Verified
        } else {
            Verification::Rejected(RejectionReason::Mismatch)
        }
    }
}

/// Hex-encoded HMAC-SHA256 of `body` keyed by `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Remove the first matching known prefix from a signature header value.
pub fn strip_signature_prefix(value: &str) -> &str {
    KNOWN_SIGNATURE_PREFIXES
        .iter()
        .find_map(|prefix| value.strip_prefix(prefix))
        .unwrap_or(value)
}

/// Constant-time equality of two hex digests.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
