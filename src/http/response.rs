//! JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::blockchain::faucet::FaucetError;
use crate::signer::SignerError;
use crate::transfer::{TransferError, TransferStage};

/// Error body returned by every handler.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<TransferStage>,
}

/// An HTTP status paired with an [`ErrorBody`].
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details: None,
                kind: None,
                stage: None,
            },
        }
    }

    pub fn internal(error: impl Into<String>, details: impl ToString) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error).with_details(details)
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    pub fn with_details(mut self, details: impl ToString) -> Self {
        self.body.details = Some(details.to_string());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        let mut api = ApiError::internal("Failed to send transaction", &err.source);
        api.body.kind = Some(err.kind());
        api.body.stage = Some(err.stage);
        api
    }
}

impl From<FaucetError> for ApiError {
    fn from(err: FaucetError) -> Self {
        match err {
            FaucetError::RateLimited => {
                ApiError::new(StatusCode::TOO_MANY_REQUESTS, "Rate limited").with_details(err)
            }
            FaucetError::WrongNetwork => {
                ApiError::bad_request("Faucet unavailable").with_details(err)
            }
            other => ApiError::internal("Faucet request failed", other),
        }
    }
}

impl From<SignerError> for ApiError {
    fn from(err: SignerError) -> Self {
        let status = match err {
            SignerError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, "Signer request failed").with_details(err)
    }
}
