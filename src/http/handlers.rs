//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::faucet::FaucetReceipt;
use crate::blockchain::transaction::format_micro_stx;
use crate::blockchain::types::Txid;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::monitor::TrackedTransaction;
use crate::signer::{HashFunction, RawSignature, RemoteSigner};
use crate::transfer::{TransferReceipt, TransferRequest};

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    /// Hex payload; the signer hashes it with SHA-256.
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub public_key: String,
    pub network: String,
    /// Available balance, six fraction digits.
    pub balance: String,
    pub locked: String,
    pub total: String,
}

#[derive(Debug, Serialize)]
pub struct FaucetResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PrivateKeyQuery {
    #[serde(rename = "privateKeyId")]
    pub private_key_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /sign`: free-form payload signing.
pub async fn sign(
    State(state): State<AppState>,
    payload: Result<Json<SignRequest>, JsonRejection>,
) -> Result<Json<RawSignature>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request("Invalid request body").with_details(e.body_text()))?;

    let message = request.message.trim();
    let message = message.strip_prefix("0x").unwrap_or(message);
    if message.is_empty() || hex::decode(message).is_err() {
        return Err(ApiError::internal("failed to sign", "message must be a non-empty hex string"));
    }

    state
        .signer
        .sign_raw_payload(message, HashFunction::Sha256)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "Signing request failed");
            ApiError::internal("failed to sign", e)
        })
}

/// `POST /send`: run the full transfer pipeline.
pub async fn send(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferReceipt>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request("Invalid request body").with_details(e.body_text()))?;

    match state.engine.send(&request).await {
        Ok(receipt) => Ok(Json(receipt)),
        Err(e) => {
            tracing::error!(stage = %e.stage, kind = e.kind(), error = %e.source, "Transfer failed");
            Err(e.into())
        }
    }
}

/// `GET /wallet-info`: sender address and balance.
pub async fn wallet_info(State(state): State<AppState>) -> Result<Json<WalletInfo>, ApiError> {
    let account = state.engine.account();
    let balance = state
        .chain
        .get_balance(account.address())
        .await
        .map_err(|e| ApiError::internal("Failed to fetch wallet info", e))?;

    Ok(Json(WalletInfo {
        address: account.address().to_string(),
        public_key: account.public_key().to_hex(),
        network: account.network().to_string(),
        balance: format_micro_stx(balance.available_micro_units),
        locked: format_micro_stx(balance.locked_micro_units),
        total: format_micro_stx(balance.total_micro_units),
    }))
}

/// `POST /faucet`: request testnet funds for the sender.
pub async fn faucet(State(state): State<AppState>) -> Result<Json<FaucetResponse>, ApiError> {
    if !state.config.faucet.enabled {
        return Err(ApiError::not_found("Faucet disabled"));
    }

    let FaucetReceipt { txid, message } = state
        .chain
        .request_faucet(state.engine.account().address())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Faucet request failed");
            ApiError::from(e)
        })?;

    Ok(Json(FaucetResponse {
        success: true,
        txid,
        message,
    }))
}

/// `GET /transactions/{txid}`: latest tracked status.
pub async fn transaction_status(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<TrackedTransaction>, ApiError> {
    let txid: Txid = txid
        .parse()
        .map_err(|e: String| ApiError::bad_request("Invalid transaction id").with_details(e))?;

    state
        .registry
        .get(&txid)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Transaction not tracked"))
}

/// `GET /wallets`: wallets known to the signer.
pub async fn wallets(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.signer.list_wallets().await.map(Json).map_err(ApiError::from)
}

/// `GET /private-key?privateKeyId=`: signer key metadata.
pub async fn private_key(
    State(state): State<AppState>,
    Query(query): Query<PrivateKeyQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = query
        .private_key_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("privateKeyId is required"))?;

    state.signer.get_private_key(&id).await.map(Json).map_err(ApiError::from)
}
