//! End-to-end transfer pipeline.
//!
//! # Stages
//! ```text
//! validation → (nonce_fetch ∥ balance_fetch) → build → signing
//!            → verification → broadcast → monitor registration
//! ```
//!
//! Reads are retried with backoff; signing and broadcast run exactly once.
//! Nonces are read, never reserved: concurrent transfers from the same
//! sender race, and all but one are rejected at broadcast.

use std::sync::Arc;

use crate::blockchain::address::Principal;
use crate::blockchain::client::ChainClient;
use crate::blockchain::transaction::{
    build_unsigned_transfer, parse_stx_amount, splice_signature, FeePolicy, SignedTransaction,
    TransactionError, TransferParams, MEMO_MAX_BYTES,
};
use crate::blockchain::types::explorer_url;
use crate::blockchain::wallet::{verify_signature, Account};
use crate::config::WalletConfig;
use crate::lifecycle::Shutdown;
use crate::monitor::{TransactionMonitor, TransactionRegistry};
use crate::resilience::{retry_read, RetryPolicy};
use crate::signer::RemoteSigner;
use crate::transfer::types::{
    TransferError, TransferFailure, TransferReceipt, TransferRequest, TransferStage,
};

struct Tracking {
    registry: TransactionRegistry,
    monitor: Arc<TransactionMonitor<ChainClient>>,
    shutdown: Shutdown,
}

/// Sends transfers from the custodial account.
pub struct TransferEngine {
    account: Account,
    chain: ChainClient,
    signer: Arc<dyn RemoteSigner>,
    fee_micro_units: u64,
    fee_policy: FeePolicy,
    verify_signatures: bool,
    retry: RetryPolicy,
    explorer_base_url: String,
    tracking: Option<Tracking>,
}

impl TransferEngine {
    pub fn new(
        account: Account,
        chain: ChainClient,
        signer: Arc<dyn RemoteSigner>,
        config: &WalletConfig,
    ) -> Self {
        Self {
            account,
            chain,
            signer,
            fee_micro_units: config.transfer.fee_micro_units,
            fee_policy: FeePolicy {
                fee_rate_per_byte: config.transfer.fee_rate_per_byte,
            },
            verify_signatures: config.transfer.verify_signature,
            retry: RetryPolicy::from(&config.retries),
            explorer_base_url: config.explorer.base_url.clone(),
            tracking: None,
        }
    }

    /// Hand every accepted txid to a monitor task feeding `registry`.
    pub fn with_tracking(
        mut self,
        registry: TransactionRegistry,
        monitor: Arc<TransactionMonitor<ChainClient>>,
        shutdown: Shutdown,
    ) -> Self {
        self.tracking = Some(Tracking {
            registry,
            monitor,
            shutdown,
        });
        self
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Validate, build, sign, verify, and broadcast a transfer.
    pub async fn send(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        let network = self.account.network();
        let validation = |e: TransactionError| TransferError::new(TransferStage::Validation, e);

        let amount = parse_stx_amount(&request.amount).map_err(validation)?;
        if amount == 0 {
            return Err(validation(TransactionError::InvalidAmount(
                "amount must be greater than zero".to_string(),
            )));
        }
        let recipient = Principal::parse(&request.recipient, network)
            .map_err(|e| validation(TransactionError::from(e)))?;
        let memo = request.memo.clone().filter(|m| !m.is_empty());
        if let Some(memo) = &memo {
            if memo.len() > MEMO_MAX_BYTES {
                return Err(validation(TransactionError::MemoTooLong { len: memo.len() }));
            }
        }

        tracing::info!(
            sender = %self.account.address(),
            recipient = %recipient,
            amount,
            "Starting transfer"
        );

        let signed = self.prepare(&recipient.to_string(), amount, memo).await?;
        let nonce = signed.transfer().nonce();

        let txid = self
            .chain
            .broadcast(&signed)
            .await
            .map_err(|e| TransferError::new(TransferStage::Broadcast, e))?;

        let explorer = explorer_url(&self.explorer_base_url, &txid, network);
        let monitored = match &self.tracking {
            Some(tracking) => {
                // A rebroadcast of known bytes keeps the existing monitor.
                let _ = tracking.registry.spawn_tracked(
                    tracking.monitor.clone(),
                    txid,
                    explorer.clone(),
                    tracking.shutdown.subscribe(),
                );
                true
            }
            None => false,
        };

        Ok(TransferReceipt {
            txid,
            explorer_url: explorer,
            sender: *self.account.address(),
            recipient: recipient.to_string(),
            amount_micro_units: amount,
            fee_micro_units: self.fee_micro_units,
            nonce,
            monitored,
        })
    }

    /// Everything up to (not including) broadcast.
    pub async fn prepare(
        &self,
        recipient: &str,
        amount_micro_units: u64,
        memo: Option<String>,
    ) -> Result<SignedTransaction, TransferError> {
        let address = *self.account.address();

        let (nonce, balance) = tokio::try_join!(
            async {
                retry_read(&self.retry, "nonce", || self.chain.get_nonce(&address))
                    .await
                    .map_err(|e| TransferError::new(TransferStage::NonceFetch, e))
            },
            async {
                retry_read(&self.retry, "balance", || self.chain.get_balance(&address))
                    .await
                    .map_err(|e| TransferError::new(TransferStage::BalanceFetch, e))
            },
        )?;

        let required = amount_micro_units.saturating_add(self.fee_micro_units);
        if balance.available_micro_units < required {
            return Err(TransferError::new(
                TransferStage::Validation,
                TransferFailure::InsufficientFunds {
                    available: balance.available_micro_units,
                    required,
                },
            ));
        }

        let params = TransferParams {
            recipient: recipient.to_string(),
            amount_micro_units,
            fee_micro_units: self.fee_micro_units,
            nonce,
            sender_public_key: *self.account.public_key(),
            memo,
            network: self.account.network(),
        };
        let (unsigned, hash) = build_unsigned_transfer(params, &self.fee_policy)
            .map_err(|e| TransferError::new(TransferStage::Build, e))?;

        let raw = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|e| TransferError::new(TransferStage::Signing, e))?;
        let signed = splice_signature(unsigned, &raw)
            .map_err(|e| TransferError::new(TransferStage::Signing, e))?;

        if self.verify_signatures
            && !verify_signature(self.account.public_key(), &hash, signed.signature())
        {
            tracing::error!(sighash = %hash, "Signer returned a signature for a different key");
            return Err(TransferError::new(
                TransferStage::Verification,
                TransferFailure::SignatureMismatch,
            ));
        }

        tracing::info!(
            nonce,
            fee = self.fee_micro_units,
            txid = %signed.txid(),
            "Transfer signed"
        );
        Ok(signed)
    }
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("sender", &self.account.address().to_string())
            .field("fee_micro_units", &self.fee_micro_units)
            .field("tracking", &self.tracking.is_some())
            .finish_non_exhaustive()
    }
}
