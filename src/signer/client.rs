//! Remote custodial signer client.
//!
//! # Responsibilities
//! - Submit raw-payload signing activities and parse the (r, s, v) result
//! - Stamp every request with the API key pair
//! - Map HTTP and activity failures onto `SignerError`
//!
//! Nothing here retries: a repeated signing request is a new activity.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::blockchain::client::http_client;
use crate::blockchain::transaction::SigningHash;
use crate::config::SignerConfig;
use crate::observability::metrics;
use crate::signer::stamp::{ApiKeyStamper, STAMP_HEADER};
use crate::signer::types::{
    ActivityEnvelope, HashFunction, RawSignature, SignRawPayloadParameters,
    SignRawPayloadRequest, SignerError, SignerResult, ACTIVITY_SIGN_RAW_PAYLOAD,
    PAYLOAD_ENCODING_HEX, STATUS_COMPLETED, STATUS_CONSENSUS_NEEDED, STATUS_FAILED,
    STATUS_REJECTED,
};

/// Capability to obtain a raw signature over a payload.
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    /// Sign hex `payload` using `hash_function`.
    async fn sign_raw_payload(
        &self,
        payload_hex: &str,
        hash_function: HashFunction,
    ) -> SignerResult<RawSignature>;

    /// Sign a final pre-sign hash; no further hashing is applied.
    async fn sign_hash(&self, hash: &SigningHash) -> SignerResult<RawSignature> {
        self.sign_raw_payload(&hash.to_hex(), HashFunction::NoOp).await
    }
}

/// HTTP client for the signer's activity API.
#[derive(Clone)]
pub struct SignerClient {
    http: reqwest::Client,
    base_url: String,
    organization_id: String,
    sign_with: String,
    stamper: Arc<ApiKeyStamper>,
}

impl SignerClient {
    pub fn new(config: &SignerConfig, use_system_proxy: bool) -> SignerResult<Self> {
        let stamper = ApiKeyStamper::new(&config.api_public_key, &config.api_private_key)?;
        let http = http_client(
            Duration::from_secs(config.timeout_secs),
            use_system_proxy,
            HeaderMap::new(),
        )
        .map_err(|e| SignerError::Config(e.to_string()))?;

        tracing::info!(
            base_url = %config.base_url,
            organization_id = %config.organization_id,
            sign_with = %config.signing_identity(),
            api_public_key = %stamper.public_key_hex(),
            "Signer client initialized"
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            organization_id: config.organization_id.clone(),
            sign_with: config.signing_identity().to_string(),
            stamper: Arc::new(stamper),
        })
    }

    /// Wallets visible to the organization, as returned by the signer.
    pub async fn list_wallets(&self) -> SignerResult<Value> {
        let body = json!({ "organizationId": self.organization_id });
        self.post_stamped("/public/v1/query/list_wallets", &body).await
    }

    /// Metadata of a private key held by the signer (never the key itself).
    pub async fn get_private_key(&self, private_key_id: &str) -> SignerResult<Value> {
        let body = json!({
            "organizationId": self.organization_id,
            "privateKeyId": private_key_id,
        });
        self.post_stamped("/public/v1/query/get_private_key", &body).await
    }

    async fn post_stamped<B: Serialize>(&self, path: &str, body: &B) -> SignerResult<Value> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| SignerError::Config(format!("failed to encode request: {}", e)))?;
        let stamp = self.stamper.stamp(&bytes)?;

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json")
            .header(STAMP_HEADER, stamp)
            .body(bytes)
            .send()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        if status.is_server_error() {
            return Err(SignerError::Unavailable(format!("status {}: {}", status.as_u16(), text)));
        }
        if !status.is_success() {
            return Err(SignerError::Rejected(error_message(status.as_u16(), &text)));
        }

        serde_json::from_str(&text).map_err(|e| SignerError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl RemoteSigner for SignerClient {
    async fn sign_raw_payload(
        &self,
        payload_hex: &str,
        hash_function: HashFunction,
    ) -> SignerResult<RawSignature> {
        let request = SignRawPayloadRequest {
            activity_type: ACTIVITY_SIGN_RAW_PAYLOAD,
            timestamp_ms: timestamp_ms(),
            organization_id: &self.organization_id,
            parameters: SignRawPayloadParameters {
                sign_with: &self.sign_with,
                payload: payload_hex,
                encoding: PAYLOAD_ENCODING_HEX,
                hash_function,
            },
        };

        let result = self
            .post_stamped("/public/v1/submit/sign_raw_payload", &request)
            .await
            .and_then(parse_activity);

        match &result {
            Ok(signature) => {
                metrics::record_signer_request("completed");
                tracing::debug!(
                    sign_with = %self.sign_with,
                    r = %truncate(&signature.r),
                    v = %signature.v,
                    "Signer returned signature"
                );
            }
            Err(e) => {
                let outcome = match e {
                    SignerError::Unavailable(_) => "unavailable",
                    SignerError::Rejected(_) => "rejected",
                    SignerError::MalformedResponse(_) => "malformed",
                    SignerError::Config(_) => "config",
                };
                metrics::record_signer_request(outcome);
                tracing::warn!(sign_with = %self.sign_with, error = %e, "Signing failed");
            }
        }
        result
    }
}

impl std::fmt::Debug for SignerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerClient")
            .field("base_url", &self.base_url)
            .field("organization_id", &self.organization_id)
            .field("sign_with", &self.sign_with)
            .finish_non_exhaustive()
    }
}

fn timestamp_ms() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

fn truncate(value: &str) -> &str {
    value.get(..12).unwrap_or(value)
}

fn error_message(status: u16, text: &str) -> String {
    let body: Value = serde_json::from_str(text).unwrap_or(Value::Null);
    let message = body["message"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .unwrap_or(text);
    format!("status {}: {}", status, message)
}

/// Interpret a sign-raw-payload activity response.
fn parse_activity(body: Value) -> SignerResult<RawSignature> {
    let envelope: ActivityEnvelope =
        serde_json::from_value(body).map_err(|e| SignerError::MalformedResponse(e.to_string()))?;
    let activity = envelope.activity;

    match activity.status.as_str() {
        STATUS_COMPLETED => {}
        STATUS_FAILED | STATUS_REJECTED | STATUS_CONSENSUS_NEEDED => {
            let detail = activity
                .failure
                .as_ref()
                .and_then(|f| f["failureMessage"].as_str())
                .unwrap_or_default();
            return Err(SignerError::Rejected(format!(
                "activity {} ended with {} {}",
                activity.id.as_deref().unwrap_or("?"),
                activity.status,
                detail
            )
            .trim_end()
            .to_string()));
        }
        other => {
            return Err(SignerError::Rejected(format!(
                "activity did not complete (status {})",
                other
            )))
        }
    }

    let signature = activity
        .result
        .and_then(|r| r.sign_raw_payload_result)
        .ok_or_else(|| SignerError::MalformedResponse("missing signRawPayloadResult".to_string()))?;

    if signature.r.is_empty() || signature.s.is_empty() || signature.v.is_empty() {
        return Err(SignerError::MalformedResponse(
            "signature has empty components".to_string(),
        ));
    }
    Ok(signature)
}
