//! Signer types, wire schemas, and errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw ECDSA components as returned by the signer, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    pub r: String,
    pub s: String,
    pub v: String,
}

/// How the signer treats the payload before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashFunction {
    /// The payload is already a final 32-byte digest.
    #[serde(rename = "HASH_FUNCTION_NO_OP")]
    NoOp,
    /// The signer hashes the payload with SHA-256 first.
    #[serde(rename = "HASH_FUNCTION_SHA256")]
    Sha256,
}

/// Errors raised by the remote signer adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// Transport failure or signer-side outage (5xx).
    #[error("Signer unavailable: {0}")]
    Unavailable(String),

    /// The signer declined the request (policy, auth, or activity failure).
    #[error("Signer rejected the request: {0}")]
    Rejected(String),

    /// The signer answered with a body missing the expected fields.
    #[error("Malformed signer response: {0}")]
    MalformedResponse(String),

    /// Local configuration is unusable (bad API key, URL).
    #[error("Signer configuration error: {0}")]
    Config(String),
}

/// Result type for signer operations.
pub type SignerResult<T> = Result<T, SignerError>;

pub(crate) const ACTIVITY_SIGN_RAW_PAYLOAD: &str = "ACTIVITY_TYPE_SIGN_RAW_PAYLOAD_V2";
pub(crate) const PAYLOAD_ENCODING_HEX: &str = "PAYLOAD_ENCODING_HEXADECIMAL";

pub(crate) const STATUS_COMPLETED: &str = "ACTIVITY_STATUS_COMPLETED";
pub(crate) const STATUS_FAILED: &str = "ACTIVITY_STATUS_FAILED";
pub(crate) const STATUS_REJECTED: &str = "ACTIVITY_STATUS_REJECTED";
pub(crate) const STATUS_CONSENSUS_NEEDED: &str = "ACTIVITY_STATUS_CONSENSUS_NEEDED";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignRawPayloadRequest<'a> {
    #[serde(rename = "type")]
    pub activity_type: &'static str,
    pub timestamp_ms: String,
    pub organization_id: &'a str,
    pub parameters: SignRawPayloadParameters<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignRawPayloadParameters<'a> {
    pub sign_with: &'a str,
    pub payload: &'a str,
    pub encoding: &'static str,
    pub hash_function: HashFunction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActivityEnvelope {
    pub activity: Activity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Activity {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub result: Option<ActivityResult>,
    #[serde(default)]
    pub failure: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActivityResult {
    #[serde(default)]
    pub sign_raw_payload_result: Option<RawSignature>,
}
