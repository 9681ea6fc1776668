//! Transfer pipeline tests against mock indexer and signer backends.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sha2::{Digest, Sha512_256};

use common::{IndexerScript, MockResponse, MockServer, RECIPIENT, SECRET_ONE, SENDER_ADDRESS};
use custody_wallet::blockchain::{Account, ChainClient};
use custody_wallet::config::WalletConfig;
use custody_wallet::lifecycle::Shutdown;
use custody_wallet::monitor::{MonitorSettings, MonitorStatus, TransactionMonitor, TransactionRegistry};
use custody_wallet::signer::SignerClient;
use custody_wallet::transfer::{TransferEngine, TransferRequest, TransferStage};

fn engine(config: &WalletConfig) -> TransferEngine {
    let account = Account::from_public_key_hex(&config.signer.public_key, config.network).unwrap();
    let chain = ChainClient::new(&config.indexer, config.network).unwrap();
    let signer = SignerClient::new(&config.signer, false).unwrap();
    TransferEngine::new(account, chain, Arc::new(signer), config)
}

fn request(amount: &str) -> TransferRequest {
    TransferRequest {
        recipient: RECIPIENT.to_string(),
        amount: amount.to_string(),
        memo: None,
    }
}

async fn backends(script: IndexerScript) -> (MockServer, MockServer) {
    (common::start_indexer(script).await, common::start_signer(SECRET_ONE).await)
}

#[tokio::test]
async fn test_send_broadcasts_signed_transfer() {
    let (indexer, signer) = backends(IndexerScript::default()).await;
    let config = common::test_config(&indexer, &signer);

    let receipt = engine(&config).send(&request("1.5")).await.unwrap();

    assert_eq!(receipt.sender.to_string(), SENDER_ADDRESS);
    assert_eq!(receipt.recipient, RECIPIENT);
    assert_eq!(receipt.amount_micro_units, 1_500_000);
    assert_eq!(receipt.fee_micro_units, 180);
    assert_eq!(receipt.nonce, 3);
    assert!(!receipt.monitored);
    assert!(receipt.explorer_url.ends_with("?chain=testnet"));

    let nonce_request = indexer.last("/v2/accounts/").unwrap();
    assert_eq!(nonce_request.path(), format!("/v2/accounts/{}", SENDER_ADDRESS));
    assert_eq!(nonce_request.query(), "proof=0");

    let broadcast = indexer.last("/v2/transactions").unwrap();
    assert_eq!(broadcast.method, "POST");
    assert_eq!(broadcast.header("content-type"), Some("application/octet-stream"));
    assert_eq!(broadcast.body.len(), 180);
    assert_eq!(broadcast.body[0], 0x80);
    assert_eq!(&broadcast.body[27..35], &3u64.to_be_bytes());
    assert_eq!(&broadcast.body[35..43], &180u64.to_be_bytes());
    assert_eq!(
        receipt.txid.to_string(),
        hex::encode(Sha512_256::digest(&broadcast.body))
    );

    let sign_request = signer.last("/public/v1/submit/sign_raw_payload").unwrap();
    assert!(sign_request.header("x-stamp").is_some());
    let body = sign_request.json();
    assert_eq!(body["organizationId"], "org-test");
    assert_eq!(body["parameters"]["hashFunction"], "HASH_FUNCTION_NO_OP");
    assert_eq!(body["parameters"]["payload"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_memo_is_carried_in_payload() {
    let (indexer, signer) = backends(IndexerScript::default()).await;
    let config = common::test_config(&indexer, &signer);

    let mut transfer = request("0.000001");
    transfer.memo = Some("invoice 42".to_string());
    engine(&config).send(&transfer).await.unwrap();

    let broadcast = indexer.last("/v2/transactions").unwrap();
    assert_eq!(broadcast.body.len(), 180);
    let memo_start = broadcast.body.len() - 34;
    assert_eq!(&broadcast.body[memo_start..memo_start + 10], b"invoice 42");
    assert!(broadcast.body[memo_start + 10..].iter().all(|b| *b == 0));
}

#[tokio::test]
async fn test_rejected_broadcast_reports_reason() {
    let script = IndexerScript {
        broadcast: Some(MockResponse::json(
            400,
            json!({ "error": "transaction rejected", "reason": "BadNonce", "reason_data": { "expected": 4, "actual": 3 } }),
        )),
        ..IndexerScript::default()
    };
    let (indexer, signer) = backends(script).await;
    let config = common::test_config(&indexer, &signer);

    let err = engine(&config).send(&request("1")).await.unwrap_err();

    assert_eq!(err.stage, TransferStage::Broadcast);
    assert_eq!(err.kind(), "BroadcastRejected");
    assert!(err.to_string().contains("BadNonce"));
    assert_eq!(indexer.count("/v2/transactions"), 1);
}

#[tokio::test]
async fn test_insufficient_funds_stops_before_signing() {
    let script = IndexerScript {
        balance: MockResponse::json(200, json!({ "stx": { "balance": "1000", "locked": "0" } })),
        ..IndexerScript::default()
    };
    let (indexer, signer) = backends(script).await;
    let config = common::test_config(&indexer, &signer);

    let err = engine(&config).send(&request("1")).await.unwrap_err();

    assert_eq!(err.stage, TransferStage::Validation);
    assert_eq!(err.kind(), "InsufficientFunds");
    assert_eq!(signer.requests().len(), 0);
    assert_eq!(indexer.count("/v2/transactions"), 0);
}

#[tokio::test]
async fn test_nonce_fetch_is_retried_then_reported() {
    let script = IndexerScript {
        nonce: MockResponse::text(500, "indexer overloaded"),
        ..IndexerScript::default()
    };
    let (indexer, signer) = backends(script).await;
    let config = common::test_config(&indexer, &signer);

    let err = engine(&config).send(&request("1")).await.unwrap_err();

    assert_eq!(err.stage, TransferStage::NonceFetch);
    assert_eq!(err.kind(), "ChainQueryError");
    assert_eq!(indexer.count("/v2/accounts/"), config.retries.max_attempts as usize);
    assert_eq!(signer.requests().len(), 0);
}

#[tokio::test]
async fn test_invalid_input_makes_no_network_calls() {
    let (indexer, signer) = backends(IndexerScript::default()).await;
    let config = common::test_config(&indexer, &signer);
    let engine = engine(&config);

    let mut mainnet_recipient = request("1");
    mainnet_recipient.recipient = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".to_string();
    let err = engine.send(&mainnet_recipient).await.unwrap_err();
    assert_eq!(err.stage, TransferStage::Validation);
    assert_eq!(err.kind(), "ValidationError");

    for amount in ["0", "-1", "abc", "1.0000001"] {
        let err = engine.send(&request(amount)).await.unwrap_err();
        assert_eq!(err.stage, TransferStage::Validation, "amount {}", amount);
    }

    let mut long_memo = request("1");
    long_memo.memo = Some("x".repeat(35));
    let err = engine.send(&long_memo).await.unwrap_err();
    assert_eq!(err.stage, TransferStage::Validation);

    assert!(indexer.requests().is_empty());
    assert!(signer.requests().is_empty());
}

#[tokio::test]
async fn test_signer_failure_stops_before_broadcast() {
    let indexer = common::start_indexer(IndexerScript::default()).await;
    let signer = common::start_mock_server(|_| {
        MockResponse::json(
            200,
            json!({
                "activity": {
                    "id": "act-9",
                    "status": "ACTIVITY_STATUS_FAILED",
                    "failure": { "failureMessage": "policy denied" }
                }
            }),
        )
    })
    .await;
    let config = common::test_config(&indexer, &signer);

    let err = engine(&config).send(&request("1")).await.unwrap_err();

    assert_eq!(err.stage, TransferStage::Signing);
    assert_eq!(err.kind(), "SignerRejected");
    assert_eq!(signer.requests().len(), 1);
    assert_eq!(indexer.count("/v2/transactions"), 0);
}

#[tokio::test]
async fn test_signature_from_wrong_key_is_caught() {
    let indexer = common::start_indexer(IndexerScript::default()).await;
    let signer = common::start_signer(
        "0000000000000000000000000000000000000000000000000000000000000002",
    )
    .await;
    let mut config = common::test_config(&indexer, &signer);
    config.transfer.verify_signature = true;

    let err = engine(&config).send(&request("1")).await.unwrap_err();

    assert_eq!(err.stage, TransferStage::Verification);
    assert_eq!(err.kind(), "SignatureMismatch");
    assert_eq!(indexer.count("/v2/transactions"), 0);
}

#[tokio::test]
async fn test_tracked_transfer_reaches_confirmation() {
    let (indexer, signer) = backends(IndexerScript::default()).await;
    let config = common::test_config(&indexer, &signer);

    let registry = TransactionRegistry::new();
    let chain = ChainClient::new(&config.indexer, config.network).unwrap();
    let monitor = Arc::new(TransactionMonitor::new(chain, MonitorSettings::from(&config.monitor)));
    let shutdown = Shutdown::new();
    let engine = engine(&config).with_tracking(registry.clone(), monitor, shutdown.clone());

    let receipt = engine.send(&request("2")).await.unwrap();
    assert!(receipt.monitored);

    let mut status = MonitorStatus::Pending;
    for _ in 0..100 {
        status = registry.get(&receipt.txid).unwrap().latest.status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, MonitorStatus::Confirmed);

    let tracked = registry.get(&receipt.txid).unwrap();
    assert_eq!(tracked.latest.block_height, Some(12345));
    assert_eq!(
        indexer.last("/extended/v1/tx/").unwrap().path(),
        format!("/extended/v1/tx/{}", receipt.txid)
    );
}

#[tokio::test]
async fn test_rebroadcast_keeps_single_tracked_entry() {
    let script = IndexerScript {
        tx_status: MockResponse::text(404, "not found"),
        ..IndexerScript::default()
    };
    let (indexer, signer) = backends(script).await;
    let mut config = common::test_config(&indexer, &signer);
    config.monitor.max_attempts = 1;

    let registry = TransactionRegistry::new();
    let chain = ChainClient::new(&config.indexer, config.network).unwrap();
    let monitor = Arc::new(TransactionMonitor::new(chain, MonitorSettings::from(&config.monitor)));
    let shutdown = Shutdown::new();
    let engine = engine(&config).with_tracking(registry.clone(), monitor, shutdown.clone());

    let first = engine.send(&request("1")).await.unwrap();
    let mut status = MonitorStatus::Pending;
    for _ in 0..100 {
        status = registry.get(&first.txid).unwrap().latest.status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, MonitorStatus::Timeout);

    // Same nonce and deterministic signing give identical bytes.
    let second = engine.send(&request("1")).await.unwrap();
    assert_eq!(second.txid, first.txid);
    assert_eq!(indexer.count("/v2/transactions"), 2);

    let tracked = registry.get(&first.txid).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(tracked.latest.status, MonitorStatus::Timeout);
    assert!(tracked.finished_at_ms.is_some());
}
