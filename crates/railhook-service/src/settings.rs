//! Layered configuration loading.
//!
//! Sources, applied in order (later sources override earlier ones):
//!  1. `/etc/railhook/service.yaml`     system-wide defaults
//!  2. `./config/service.yaml`          deployment-local override
//!  3. path in `RAILHOOK_CONFIG_FILE`   operator-specified file, required when set
//!  4. `RAILHOOK__SECTION__KEY` environment variables,
//!     e.g. `RAILHOOK__PROVIDERS__BRIDGE__WEBHOOK_SECRET`
//!
//! Absent files are fine since every field has a default. A malformed file,
//! or a value that cannot be coerced to its field type, is a hard error.

use railhook_api::ServiceConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/railhook/service";
pub const LOCAL_CONFIG_PATH: &str = "config/service";
pub const CONFIG_FILE_ENV: &str = "RAILHOOK_CONFIG_FILE";
pub const ENV_PREFIX: &str = "RAILHOOK";

/// Keys whose environment values are comma-separated lists.
const LIST_KEYS: &[&str] = &[
    "retry.extra_retryable_keywords",
    "retry.extra_terminal_keywords",
];

/// Path named by `RAILHOOK_CONFIG_FILE`, if set and non-empty.
pub fn explicit_config_path() -> Option<String> {
    std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|path| !path.is_empty())
}

/// Load [`ServiceConfig`] from the standard locations.
pub fn load() -> Result<ServiceConfig, config::ConfigError> {
    let explicit = explicit_config_path();
    load_from(&[SYSTEM_CONFIG_PATH, LOCAL_CONFIG_PATH], explicit.as_deref())
}

/// Load from optional `defaults` files, an optional required file, then the
/// environment.
pub fn load_from(
    defaults: &[&str],
    explicit_path: Option<&str>,
) -> Result<ServiceConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for path in defaults {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(false)
                .format(config::FileFormat::Yaml),
        );
    }

    if let Some(path) = explicit_path {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    let environment = LIST_KEYS.iter().fold(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        |env, key| env.with_list_parse_key(key),
    );

    builder.add_source(environment).build()?.try_deserialize()
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
