//! Testnet faucet requests.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::blockchain::address::StacksAddress;
use crate::blockchain::client::ChainClient;
use crate::blockchain::types::Network;

/// Message surfaced to users when the faucet throttles them.
pub const RATE_LIMIT_MESSAGE: &str =
    "Rate limited! You can only claim once per 5 minutes. Try again later.";

/// Message returned on a successful claim.
pub const CLAIMED_MESSAGE: &str = "STX claimed! Wait ~30 seconds for confirmation";

#[derive(Debug, Error)]
pub enum FaucetError {
    #[error("{}", RATE_LIMIT_MESSAGE)]
    RateLimited,

    #[error("Faucet request failed with status {status}: {message}")]
    Failed { status: u16, message: String },

    #[error("Faucet unreachable: {0}")]
    Network(String),

    #[error("Faucet returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Faucet is only available on testnet")]
    WrongNetwork,
}

/// Successful faucet claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaucetReceipt {
    pub txid: Option<String>,
    pub message: String,
}

impl ChainClient {
    /// Ask the indexer's faucet to fund `address`.
    pub async fn request_faucet(&self, address: &StacksAddress) -> Result<FaucetReceipt, FaucetError> {
        if self.network() != Network::Testnet {
            return Err(FaucetError::WrongNetwork);
        }

        let address_text = address.to_string();
        let response = self
            .http()
            .post(self.endpoint("/extended/v1/faucets/stx"))
            .query(&[("address", address_text.as_str()), ("stacking", "false")])
            .send()
            .await
            .map_err(|e| FaucetError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(address = %address, "Faucet rate limited");
            return Err(FaucetError::RateLimited);
        }

        let text = response
            .text()
            .await
            .map_err(|e| FaucetError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(FaucetError::Failed {
                status: status.as_u16(),
                message: text,
            });
        }

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if text.contains("txid") || text.contains("success") => {
                tracing::info!(address = %address, "Faucet claim accepted (plain-text response)");
                return Ok(FaucetReceipt {
                    txid: None,
                    message: CLAIMED_MESSAGE.to_string(),
                });
            }
            Err(e) => return Err(FaucetError::InvalidResponse(e.to_string())),
        };
        if body["success"] == Value::Bool(false) {
            let message = body["error"].as_str().unwrap_or("faucet refused the claim");
            return Err(FaucetError::Failed {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }

        let txid = body["txId"]
            .as_str()
            .or_else(|| body["txid"].as_str())
            .map(str::to_string);
        tracing::info!(address = %address, txid = ?txid, "Faucet claim accepted");
        Ok(FaucetReceipt {
            txid,
            message: CLAIMED_MESSAGE.to_string(),
        })
    }
}
