//! Chain indexer client with timeout and error handling.
//!
//! # Responsibilities
//! - Query account state (nonce, balances)
//! - Post signed transactions
//! - Look up transaction status by id
//!
//! No retries happen at this layer; callers decide what to repeat.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::blockchain::address::StacksAddress;
use crate::blockchain::transaction::SignedTransaction;
use crate::blockchain::types::{
    AccountBalance, ChainError, ChainResult, Network, TransactionRecord, Txid,
};
use crate::config::IndexerConfig;
use crate::observability::metrics;

/// Build a `reqwest` client with a request deadline.
///
/// `use_system_proxy = false` bypasses proxy environment variables, which
/// local mock servers in tests depend on.
pub fn http_client(
    timeout: Duration,
    use_system_proxy: bool,
    default_headers: HeaderMap,
) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(default_headers);
    if !use_system_proxy {
        builder = builder.no_proxy();
    }
    builder.build()
}

/// Indexer API client. Cheap to clone.
#[derive(Clone)]
pub struct ChainClient {
    http: reqwest::Client,
    base_url: Url,
    network: Network,
}

impl ChainClient {
    pub fn new(config: &IndexerConfig, network: Network) -> ChainResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ChainError::Network(format!("Invalid indexer URL '{}': {}", config.base_url, e))
        })?;

        let mut headers = HeaderMap::new();
        if let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(api_key)
                .map_err(|_| ChainError::Network("API key is not a valid header value".to_string()))?;
            headers.insert("x-api-key", value);
        }

        let http = http_client(
            Duration::from_secs(config.timeout_secs),
            config.use_system_proxy,
            headers,
        )
        .map_err(transport)?;

        tracing::info!(
            base_url = %base_url,
            network = %network,
            api_key = config.api_key.is_some(),
            "Chain client initialized"
        );

        Ok(Self {
            http,
            base_url,
            network,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Current confirmed nonce of `address`.
    pub async fn get_nonce(&self, address: &StacksAddress) -> ChainResult<u64> {
        let response = self
            .http
            .get(self.endpoint(&format!("/v2/accounts/{}", address)))
            .query(&[("proof", "0")])
            .send()
            .await
            .map_err(transport)?;

        let body = success_json(response).await?;
        let nonce = micro_units(&body["nonce"], "nonce")?;
        tracing::debug!(address = %address, nonce, "Fetched nonce");
        Ok(nonce)
    }

    /// Balances of `address`; the total is recomputed locally.
    pub async fn get_balance(&self, address: &StacksAddress) -> ChainResult<AccountBalance> {
        let response = self
            .http
            .get(self.endpoint(&format!("/extended/v1/address/{}/balances", address)))
            .send()
            .await
            .map_err(transport)?;

        let body = success_json(response).await?;
        let balance = parse_balance(&body)?;
        tracing::debug!(
            address = %address,
            available = balance.available_micro_units,
            locked = balance.locked_micro_units,
            "Fetched balance"
        );
        Ok(balance)
    }

    /// Post a signed transaction; returns the id the indexer accepted.
    pub async fn broadcast(&self, transaction: &SignedTransaction) -> ChainResult<Txid> {
        let local_txid = transaction.txid();
        let result = self.post_transaction(transaction).await;

        match &result {
            Ok(txid) => {
                metrics::record_broadcast("accepted");
                if *txid != local_txid {
                    tracing::warn!(
                        txid = %txid,
                        local_txid = %local_txid,
                        "Indexer reported a different transaction id"
                    );
                }
                tracing::info!(txid = %txid, "Transaction broadcast accepted");
            }
            Err(ChainError::BroadcastRejected { reason, .. }) => {
                metrics::record_broadcast("rejected");
                tracing::warn!(txid = %local_txid, reason = %reason, "Transaction rejected");
            }
            Err(e) => {
                metrics::record_broadcast("error");
                tracing::error!(txid = %local_txid, error = %e, "Broadcast failed");
            }
        }
        result
    }

    async fn post_transaction(&self, transaction: &SignedTransaction) -> ChainResult<Txid> {
        let response = self
            .http
            .post(self.endpoint("/v2/transactions"))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(transaction.serialize())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if status.is_success() {
            let txid = serde_json::from_str::<String>(&text).unwrap_or_else(|_| text.clone());
            return txid
                .parse()
                .map_err(|e: String| ChainError::MalformedResponse(e));
        }

        if status.is_client_error() {
            return Err(parse_rejection(&text));
        }

        Err(ChainError::Query {
            status: status.as_u16(),
            message: text,
        })
    }

    /// Transaction status record, or `None` while the indexer has not seen it.
    pub async fn get_transaction_by_id(&self, txid: &Txid) -> ChainResult<Option<TransactionRecord>> {
        let response = self
            .http
            .get(self.endpoint(&format!("/extended/v1/tx/{}", txid)))
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = success_json(response).await?;
        parse_transaction_record(body).map(Some)
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("base_url", &self.base_url.as_str())
            .field("network", &self.network)
            .finish()
    }
}

pub(crate) fn transport(e: reqwest::Error) -> ChainError {
    ChainError::Network(e.to_string())
}

/// Read a 2xx JSON body, mapping other statuses to `ChainError::Query`.
async fn success_json(response: Response) -> ChainResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ChainError::Query {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ChainError::MalformedResponse(e.to_string()))
}

/// Indexers report amounts as either JSON strings or numbers.
fn micro_units(value: &Value, field: &str) -> ChainResult<u64> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ChainError::MalformedResponse(format!("field '{}' is not an unsigned integer: {}", field, value))
    })
}

fn token_map(value: &Value) -> BTreeMap<String, Value> {
    value
        .as_object()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn parse_balance(body: &Value) -> ChainResult<AccountBalance> {
    let stx = body
        .get("stx")
        .ok_or_else(|| ChainError::MalformedResponse("missing 'stx' section".to_string()))?;

    let available = micro_units(&stx["balance"], "stx.balance")?;
    let locked = match stx.get("locked") {
        None | Some(Value::Null) => 0,
        Some(value) => micro_units(value, "stx.locked")?,
    };

    AccountBalance::new(
        available,
        locked,
        token_map(&body["fungible_tokens"]),
        token_map(&body["non_fungible_tokens"]),
    )
}

fn parse_rejection(text: &str) -> ChainError {
    let body: Value = serde_json::from_str(text).unwrap_or(Value::Null);
    let reason = body["reason"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| text.trim().to_string());
    let reason_data = body.get("reason_data").filter(|v| !v.is_null()).cloned();

    ChainError::BroadcastRejected {
        reason,
        reason_data,
    }
}

fn parse_transaction_record(body: Value) -> ChainResult<TransactionRecord> {
    let tx_status = body["tx_status"]
        .as_str()
        .ok_or_else(|| ChainError::MalformedResponse("missing 'tx_status'".to_string()))?
        .to_string();
    let tx_id = body["tx_id"].as_str().unwrap_or_default().to_string();
    let block_height = body["block_height"].as_u64();
    let block_hash = body["block_hash"].as_str().map(str::to_string);

    Ok(TransactionRecord {
        tx_id,
        tx_status,
        block_height,
        block_hash,
        raw: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_micro_units_accepts_strings_and_numbers() {
        assert_eq!(micro_units(&json!("1500000"), "x").unwrap(), 1_500_000);
        assert_eq!(micro_units(&json!(42), "x").unwrap(), 42);
        assert!(micro_units(&json!(-1), "x").is_err());
        assert!(micro_units(&json!("1.5"), "x").is_err());
        assert!(micro_units(&Value::Null, "x").is_err());
    }

    #[test]
    fn test_balance_ignores_upstream_total() {
        let body = json!({
            "stx": { "balance": "1000", "locked": 250, "total": "99999" },
            "fungible_tokens": { "SP000.token::tkn": { "balance": "5" } },
            "non_fungible_tokens": {}
        });
        let balance = parse_balance(&body).unwrap();
        assert_eq!(balance.total_micro_units, 1_250);
        assert_eq!(balance.fungible_tokens.len(), 1);
    }

    #[test]
    fn test_balance_without_locked_defaults_to_zero() {
        let balance = parse_balance(&json!({ "stx": { "balance": "7" } })).unwrap();
        assert_eq!(balance.locked_micro_units, 0);
        assert_eq!(balance.total_micro_units, 7);
        assert!(parse_balance(&json!({ "balance": "7" })).is_err());
    }

    #[test]
    fn test_rejection_reason_extraction() {
        let err = parse_rejection(
            r#"{"error":"transaction rejected","reason":"BadNonce","reason_data":{"expected":4,"actual":3}}"#,
        );
        match err {
            ChainError::BroadcastRejected { reason, reason_data } => {
                assert_eq!(reason, "BadNonce");
                assert_eq!(reason_data.unwrap()["expected"], 4);
            }
            other => panic!("unexpected {:?}", other),
        }

        let plain = parse_rejection("bad request");
        assert!(matches!(plain, ChainError::BroadcastRejected { ref reason, .. } if reason == "bad request"));
    }

    #[test]
    fn test_transaction_record_parsing() {
        let record = parse_transaction_record(json!({
            "tx_id": "0xabc",
            "tx_status": "success",
            "block_height": 12345,
            "block_hash": "0xdef"
        }))
        .unwrap();
        assert_eq!(record.tx_status, "success");
        assert_eq!(record.block_height, Some(12345));
        assert_eq!(record.block_hash.as_deref(), Some("0xdef"));

        assert!(parse_transaction_record(json!({ "tx_id": "0xabc" })).is_err());
    }
}
