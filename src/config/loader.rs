//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::WalletConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<WalletConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => WalletConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Override configuration values from environment variables.
///
/// `lookup` abstracts the environment so the mapping can be exercised without
/// mutating process state.
pub fn apply_env_overrides<F>(config: &mut WalletConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(network) = lookup("STACKS_NETWORK") {
        config.network = network.parse().map_err(|message| ConfigError::Env {
            var: "STACKS_NETWORK",
            message,
        })?;
        // A network switch without an explicit indexer points at that network's API.
        if lookup("HIRO_API_BASE_URL").is_none() {
            config.indexer.base_url = config.network.default_indexer_url().to_string();
        }
    }

    let string_overrides: [(&str, &mut String); 7] = [
        ("HIRO_API_BASE_URL", &mut config.indexer.base_url),
        ("TURNKEY_BASE_URL", &mut config.signer.base_url),
        ("TURNKEY_ORGANIZATION_ID", &mut config.signer.organization_id),
        ("TURNKEY_API_PUBLIC_KEY", &mut config.signer.api_public_key),
        ("TURNKEY_API_PRIVATE_KEY", &mut config.signer.api_private_key),
        ("TURNKEY_SIGNER_PUBLIC_KEY", &mut config.signer.public_key),
        ("TURNKEY_WALLET_ACCOUNT_ADDRESS", &mut config.signer.sign_with),
    ];
    for (var, slot) in string_overrides {
        if let Some(value) = lookup(var) {
            *slot = value;
        }
    }

    if let Some(api_key) = lookup("HIRO_API_KEY") {
        config.indexer.api_key = Some(api_key).filter(|k| !k.is_empty());
    }

    Ok(())
}
