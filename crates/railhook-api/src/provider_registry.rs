//! Provider registry for multi-provider webhook routing.
//!
//! This module provides [`ProviderRegistry`] for associating each enabled
//! [`ProviderKind`] with its [`WebhookProvider`] adapter. The registry is
//! built once at startup and used read-only during request handling.
//!
//! # URL Structure
//!
//! Each registered provider is reachable at:
//! ```text
//! POST /webhooks/{provider}
//! ```
//!
//! where `{provider}` is the slug from [`ProviderKind::as_str`].

use crate::config::ProvidersConfig;
use railhook_core::{
    BridgeAdapter, CircleAdapter, Collaborators, DueAdapter, EventDispatcher, ProviderKind,
    RetryExecutor, WebhookProvider,
};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{info, warn};

/// Registry mapping provider kinds to their webhook adapters.
///
/// All values are stored as `Arc<dyn WebhookProvider>` to allow sharing
/// across async tasks and threads.
///
/// # Examples
///
/// ```rust
/// use railhook_api::provider_registry::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// assert!(!registry.contains("bridge")); // nothing registered yet
/// assert!(registry.get("stripe").is_none());
/// ```
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn WebhookProvider>>,
}

impl ProviderRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every enabled provider in `config`.
    ///
    /// All adapters share one executor and one set of collaborators. An
    /// enabled provider without a secret is registered with verification
    /// disabled and a warning is logged.
    pub fn from_config(
        config: &ProvidersConfig,
        collaborators: Collaborators,
        executor: Arc<RetryExecutor>,
    ) -> Self {
        let mut registry = Self::new();

        for kind in ProviderKind::ALL {
            let provider_config = config.get(kind);
            if !provider_config.enabled {
                info!(provider = %kind, "Provider disabled by configuration");
                continue;
            }

            let secret = provider_config.webhook_secret.clone();
            if secret.is_empty() {
                warn!(
                    provider = %kind,
                    "No webhook secret configured; signature verification is DISABLED for this provider"
                );
            }

            let dispatcher = EventDispatcher::new(collaborators.clone(), Arc::clone(&executor));
            let adapter: Arc<dyn WebhookProvider> = match kind {
                ProviderKind::Bridge => Arc::new(BridgeAdapter::new(secret, dispatcher)),
                ProviderKind::Due => Arc::new(DueAdapter::new(secret, dispatcher)),
                ProviderKind::Circle => Arc::new(CircleAdapter::new(secret, dispatcher)),
            };
            registry.register(adapter);
            info!(provider = %kind, "Registered webhook provider");
        }

        registry
    }

    /// Register an adapter under its own [`WebhookProvider::kind`].
    ///
    /// If the provider is already registered it is replaced.
    /// Returns `&mut Self` to allow method chaining.
    pub fn register(&mut self, provider: Arc<dyn WebhookProvider>) -> &mut Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Look up an adapter by URL slug.
    ///
    /// Returns `None` for unknown slugs and for providers that were not
    /// registered.
    pub fn get(&self, slug: &str) -> Option<Arc<dyn WebhookProvider>> {
        let kind: ProviderKind = slug.parse().ok()?;
        self.providers.get(&kind).cloned()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.get(slug).is_some()
    }

    /// Registered providers in [`ProviderKind::ALL`] order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.providers.contains_key(kind))
            .collect()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
#[path = "provider_registry_tests.rs"]
mod tests;
