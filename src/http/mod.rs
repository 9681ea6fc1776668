//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, middleware stack)
//!     → request.rs (x-request-id set & propagated)
//!     → handlers.rs (sign, send, wallet-info, faucet, transactions, signer queries)
//!     → response.rs (errors → JSON bodies with status codes)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, ServerError, WalletServer};
