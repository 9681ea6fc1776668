//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Construct the chain client, signer client, transfer engine, and monitor registry
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, body limit, timeout, metrics)
//! - Serve until the shutdown signal fires

use axum::extract::Request;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::blockchain::address::AddressError;
use crate::blockchain::client::ChainClient;
use crate::blockchain::types::ChainError;
use crate::blockchain::wallet::Account;
use crate::config::WalletConfig;
use crate::http::handlers;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::monitor::{MonitorSettings, RetentionPolicy, TransactionMonitor, TransactionRegistry};
use crate::observability::metrics;
use crate::signer::{SignerClient, SignerError};
use crate::transfer::TransferEngine;

/// Errors while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid sender account: {0}")]
    Account(#[from] AddressError),

    #[error("Chain client: {0}")]
    Chain(#[from] ChainError),

    #[error("Signer client: {0}")]
    Signer(#[from] SignerError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WalletConfig>,
    pub chain: ChainClient,
    pub signer: SignerClient,
    pub engine: Arc<TransferEngine>,
    pub registry: TransactionRegistry,
}

/// HTTP server for the wallet API.
pub struct WalletServer {
    router: Router,
    state: AppState,
    shutdown: Shutdown,
}

impl WalletServer {
    /// Build every collaborator from `config`.
    pub fn new(config: WalletConfig, shutdown: Shutdown) -> Result<Self, ServerError> {
        let account = Account::from_public_key_hex(&config.signer.public_key, config.network)?;
        let chain = ChainClient::new(&config.indexer, config.network)?;
        let signer = SignerClient::new(&config.signer, config.indexer.use_system_proxy)?;
        let registry = TransactionRegistry::with_retention(RetentionPolicy::from(&config.monitor));

        let mut engine = TransferEngine::new(account, chain.clone(), Arc::new(signer.clone()), &config);
        if config.monitor.enabled {
            let monitor = Arc::new(TransactionMonitor::new(
                chain.clone(),
                MonitorSettings::from(&config.monitor),
            ));
            engine = engine.with_tracking(registry.clone(), monitor, shutdown.clone());
        }

        tracing::info!(
            address = %engine.account().address(),
            network = %config.network,
            monitor = config.monitor.enabled,
            faucet = config.faucet.enabled,
            "Wallet initialized"
        );

        let state = AppState {
            config: Arc::new(config),
            chain,
            signer,
            engine: Arc::new(engine),
            registry,
        };
        let router = Self::build_router(state.clone());

        Ok(Self {
            router,
            state,
            shutdown,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);
        let max_body_bytes = state.config.listener.max_body_bytes;

        Router::new()
            .route("/health", get(handlers::health))
            .route("/sign", post(handlers::sign))
            .route("/send", post(handlers::send))
            .route("/wallet-info", get(handlers::wallet_info))
            .route("/faucet", post(handlers::faucet))
            .route("/transactions/{txid}", get(handlers::transaction_status))
            .route("/wallets", get(handlers::wallets))
            .route("/private-key", get(handlers::private_key))
            .route_layer(middleware::from_fn(metrics::track_requests))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                        let request_id = request
                            .headers()
                            .get(&X_REQUEST_ID)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(max_body_bytes))
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until shutdown is triggered.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop = self.shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
