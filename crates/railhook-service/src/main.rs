//! # Railhook Service
//!
//! Binary entry point for the Railhook webhook service.
//!
//! This executable:
//! - Loads layered configuration from files and environment
//! - Initializes structured logging
//! - Builds one adapter per enabled provider around a shared retry executor
//! - Starts the HTTP server from railhook-api
//!
//! Exit codes: 1 bind failure, 2 server failure, 3 invalid configuration.

mod collaborators;
mod settings;

use collaborators::LoggingDownstream;
use railhook_api::{start_server, LoggingConfig, ProviderRegistry, ServiceConfig};
use railhook_core::RetryExecutor;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_EXIT_CODE: i32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let service_config = match settings::load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    init_tracing(&service_config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Railhook Service");
    if let Some(path) = settings::explicit_config_path() {
        info!(path = %path, "Loaded configuration from explicit path");
    }

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(CONFIG_EXIT_CODE);
    }

    let registry = build_registry(&service_config);

    if let Err(e) = start_server(service_config, registry).await {
        error!(error = %e, "HTTP server failed");
        std::process::exit(e.exit_code());
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_registry(config: &ServiceConfig) -> ProviderRegistry {
    let retry = &config.retry;
    let executor = Arc::new(RetryExecutor::new(
        retry.to_retry_policy(),
        retry.to_classifier(),
    ));
    info!(
        max_attempts = retry.max_attempts,
        base_delay_ms = retry.base_delay_ms,
        max_delay_ms = retry.max_delay_ms,
        backoff_multiplier = retry.backoff_multiplier,
        "Configured downstream retry policy"
    );

    ProviderRegistry::from_config(
        &config.providers,
        LoggingDownstream::collaborators(),
        executor,
    )
}
