//! Prometheus metrics for webhook handling.
//!
//! Metrics live in a registry owned by [`ServiceMetrics`] rather than the
//! process-global default, so several routers can coexist in one process.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use railhook_core::ProviderKind;
use std::sync::Arc;
use std::time::Duration;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Requests by provider and outcome (`success`, `ignored`, `invalid_signature`, ...)
    pub webhook_requests_total: IntCounterVec,

    /// End-to-end handling time, retries included
    pub webhook_duration_seconds: HistogramVec,

    pub webhook_signature_failures_total: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests_total = IntCounterVec::new(
            Opts::new("webhook_requests_total", "Total webhook requests received"),
            &["provider", "outcome"],
        )?;
        let webhook_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "webhook_duration_seconds",
                "Webhook processing time distribution",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
            &["provider"],
        )?;
        let webhook_signature_failures_total = IntCounterVec::new(
            Opts::new(
                "webhook_signature_failures_total",
                "Failed webhook signature validations",
            ),
            &["provider"],
        )?;

        registry.register(Box::new(webhook_requests_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;
        registry.register(Box::new(webhook_signature_failures_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            webhook_requests_total,
            webhook_duration_seconds,
            webhook_signature_failures_total,
        }))
    }

    pub fn record_webhook_request(&self, provider: ProviderKind, outcome: &str, duration: Duration) {
        self.webhook_requests_total
            .with_label_values(&[provider.as_str(), outcome])
            .inc();
        self.webhook_duration_seconds
            .with_label_values(&[provider.as_str()])
            .observe(duration.as_secs_f64());
    }

    pub fn record_signature_failure(&self, provider: ProviderKind) {
        self.webhook_signature_failures_total
            .with_label_values(&[provider.as_str()])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
