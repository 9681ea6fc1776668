//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics (URLs parse, keys are
//! curve points, intervals are non-zero). Every violation is reported, not just
//! the first.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::blockchain::types::Network;
use crate::blockchain::wallet::SenderPublicKey;
use crate::config::schema::WalletConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    check_url(&mut errors, "indexer.base_url", &config.indexer.base_url);
    check_url(&mut errors, "signer.base_url", &config.signer.base_url);
    check_url(&mut errors, "explorer.base_url", &config.explorer.base_url);

    if config.indexer.timeout_secs == 0 {
        errors.push(ValidationError::new("indexer.timeout_secs", "must be > 0"));
    }
    if config.signer.timeout_secs == 0 {
        errors.push(ValidationError::new("signer.timeout_secs", "must be > 0"));
    }

    let signer = &config.signer;
    if signer.organization_id.is_empty() {
        errors.push(ValidationError::new("signer.organization_id", "is required"));
    }
    if signer.api_private_key.is_empty() {
        errors.push(ValidationError::new("signer.api_private_key", "is required"));
    }
    check_public_key(&mut errors, "signer.api_public_key", &signer.api_public_key);
    check_public_key(&mut errors, "signer.public_key", &signer.public_key);

    if config.transfer.fee_micro_units == 0 {
        errors.push(ValidationError::new("transfer.fee_micro_units", "must be > 0"));
    }

    if config.monitor.max_attempts == 0 {
        errors.push(ValidationError::new("monitor.max_attempts", "must be >= 1"));
    }
    if config.monitor.poll_interval_ms == 0 {
        errors.push(ValidationError::new("monitor.poll_interval_ms", "must be > 0"));
    }
    if config.monitor.max_tracked == 0 {
        errors.push(ValidationError::new("monitor.max_tracked", "must be >= 1"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    let budget = send_worst_case(config);
    if Duration::from_secs(config.timeouts.request_secs) <= budget {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!(
                "must exceed the worst-case transfer time of {:.1}s (retried reads, signing, broadcast)",
                budget.as_secs_f64()
            ),
        ));
    }

    if config.faucet.enabled && config.network == Network::Mainnet {
        errors.push(ValidationError::new(
            "faucet.enabled",
            "the faucet only exists on testnet",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Longest a transfer can run before its broadcast answers: every read
/// attempt timing out with maximal jittered backoff, then signing and
/// broadcast each hitting their client timeout.
pub fn send_worst_case(config: &WalletConfig) -> Duration {
    let indexer = Duration::from_secs(config.indexer.timeout_secs);
    let signer = Duration::from_secs(config.signer.timeout_secs);

    let retries = &config.retries;
    let attempts = if retries.enabled { retries.max_attempts.max(1) } else { 1 };
    let base = Duration::from_millis(retries.base_delay_ms);
    let max = Duration::from_millis(retries.max_delay_ms);
    let backoff: Duration = (1..attempts)
        .map(|retry| {
            let capped = base.saturating_mul(2u32.saturating_pow(retry - 1)).min(max);
            capped + capped / 10
        })
        .fold(Duration::ZERO, Duration::saturating_add);

    indexer
        .saturating_mul(attempts)
        .saturating_add(backoff)
        .saturating_add(signer)
        .saturating_add(indexer)
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}

fn check_public_key(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.is_empty() {
        errors.push(ValidationError::new(field, "is required"));
    } else if let Err(e) = SenderPublicKey::from_hex(value) {
        errors.push(ValidationError::new(field, e.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn valid_config() -> WalletConfig {
        let mut config = WalletConfig::default();
        config.signer.organization_id = "org".to_string();
        config.signer.api_public_key = G.to_string();
        config.signer.api_private_key = "01".repeat(32);
        config.signer.public_key = G.to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = valid_config();
        config.indexer.base_url = "not a url".to_string();
        config.monitor.max_attempts = 0;
        config.signer.public_key = "02zz".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["indexer.base_url", "signer.public_key", "monitor.max_attempts"]
        );
    }

    #[test]
    fn test_request_timeout_must_cover_a_transfer() {
        let mut config = valid_config();
        // 3 x 10s reads + (200ms + 400ms) backoff with jitter + 15s sign + 10s broadcast
        assert_eq!(send_worst_case(&config), Duration::from_millis(55_660));

        config.timeouts.request_secs = 55;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "timeouts.request_secs");

        config.retries.enabled = false;
        assert_eq!(send_worst_case(&config), Duration::from_secs(35));
        assert!(validate_config(&config).is_ok());

        config.timeouts.request_secs = 0;
        assert!(validate_config(&config).is_err());
    }

        #[test]
    fn test_faucet_rejected_on_mainnet() {
        let mut config = valid_config();
        config.network = Network::Mainnet;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "faucet.enabled");

        config.faucet.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
