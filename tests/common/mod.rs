//! Shared utilities for integration tests: programmable mock HTTP backends
//! standing in for the chain indexer and the remote signer.

#![allow(dead_code)]

use axum::http::StatusCode;
use secp256k1::{Message, Secp256k1, SecretKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256, Sha512_256};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use custody_wallet::config::WalletConfig;
use custody_wallet::lifecycle::Shutdown;
use custody_wallet::WalletServer;

/// Secret key 1; its public key is the curve generator.
pub const SECRET_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
pub const SENDER_PUBLIC_KEY: &str =
    "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
pub const SENDER_ADDRESS: &str = "ST1THWXQ8368SDN2MJGE4BMDKMCHZ2GSVTSQDA7QF";
pub const RECIPIENT: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }

    pub fn query(&self) -> &str {
        self.target.split_once('?').map(|(_, q)| q).unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        }
    }
}

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct MockServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests whose path starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path().starts_with(prefix))
            .count()
    }

    pub fn last(&self, prefix: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.path().starts_with(prefix))
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_mock_server<F>(handler: F) -> MockServer
where
    F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else { break };
            let handler = handler.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let (reader, mut writer) = socket.into_split();
                let Some(request) = read_request(reader).await else { return };
                recorded.lock().unwrap().push(request.clone());

                let response = handler(&request);
                let reason = StatusCode::from_u16(response.status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");
                let raw = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    reason,
                    response.content_type,
                    response.body.len(),
                    response.body
                );
                let _ = writer.write_all(raw.as_bytes()).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    MockServer { addr, requests }
}

async fn read_request(reader: tokio::net::tcp::OwnedReadHalf) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let (name, value) = (name.trim().to_string(), value.trim().to_string());
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

/// Scriptable indexer behaviour.
#[derive(Debug, Clone)]
pub struct IndexerScript {
    pub nonce: MockResponse,
    pub balance: MockResponse,
    /// `None` answers with the txid of the posted bytes.
    pub broadcast: Option<MockResponse>,
    pub tx_status: MockResponse,
    pub faucet: MockResponse,
}

impl Default for IndexerScript {
    fn default() -> Self {
        Self {
            nonce: MockResponse::json(200, json!({ "nonce": 3, "balance": "0x0" })),
            balance: MockResponse::json(
                200,
                json!({
                    "stx": { "balance": "10000000", "locked": "0", "total_sent": "0" },
                    "fungible_tokens": {},
                    "non_fungible_tokens": {}
                }),
            ),
            broadcast: None,
            tx_status: MockResponse::json(
                200,
                json!({ "tx_status": "success", "block_height": 12345, "block_hash": "0xbeef" }),
            ),
            faucet: MockResponse::json(200, json!({ "success": true, "txId": "0xfaucet" })),
        }
    }
}

/// Mock chain indexer routing by path.
pub async fn start_indexer(script: IndexerScript) -> MockServer {
    start_mock_server(move |request| {
        let path = request.path();
        if path.starts_with("/v2/accounts/") {
            script.nonce.clone()
        } else if path.ends_with("/balances") {
            script.balance.clone()
        } else if path == "/v2/transactions" {
            match &script.broadcast {
                Some(response) => response.clone(),
                None => {
                    let txid = hex::encode(Sha512_256::digest(&request.body));
                    MockResponse::json(200, Value::String(txid))
                }
            }
        } else if path.starts_with("/extended/v1/tx/") {
            script.tx_status.clone()
        } else if path.starts_with("/extended/v1/faucets/stx") {
            script.faucet.clone()
        } else {
            MockResponse::text(404, "not found")
        }
    })
    .await
}

/// Recoverable signature over `digest` as signer-style hex components.
pub fn sign_digest(secret_hex: &str, digest: [u8; 32]) -> Value {
    let secret = SecretKey::from_slice(&hex::decode(secret_hex).unwrap()).unwrap();
    let signature =
        Secp256k1::new().sign_ecdsa_recoverable(&Message::from_digest(digest), &secret);
    let (recovery_id, compact) = signature.serialize_compact();
    json!({
        "r": hex::encode(&compact[..32]),
        "s": hex::encode(&compact[32..]),
        "v": format!("{:02x}", recovery_id.to_i32()),
    })
}

/// Mock signer that signs with `secret_hex`, honouring the requested hash function.
pub async fn start_signer(secret_hex: &'static str) -> MockServer {
    start_mock_server(move |request| {
        let body = request.json();
        match request.path() {
            "/public/v1/submit/sign_raw_payload" => {
                let parameters = &body["parameters"];
                let payload = hex::decode(parameters["payload"].as_str().unwrap_or("")).unwrap_or_default();
                let digest: [u8; 32] = match parameters["hashFunction"].as_str() {
                    Some("HASH_FUNCTION_SHA256") => Sha256::digest(&payload).into(),
                    _ => match payload.try_into() {
                        Ok(digest) => digest,
                        Err(_) => return MockResponse::json(400, json!({ "message": "payload must be 32 bytes" })),
                    },
                };
                MockResponse::json(
                    200,
                    json!({
                        "activity": {
                            "id": "act-1",
                            "status": "ACTIVITY_STATUS_COMPLETED",
                            "result": { "signRawPayloadResult": sign_digest(secret_hex, digest) }
                        }
                    }),
                )
            }
            "/public/v1/query/list_wallets" => MockResponse::json(
                200,
                json!({ "wallets": [{ "walletId": "w-1", "walletName": "demo" }] }),
            ),
            "/public/v1/query/get_private_key" => MockResponse::json(
                200,
                json!({ "privateKey": { "privateKeyId": body["privateKeyId"], "curve": "CURVE_SECP256K1" } }),
            ),
            _ => MockResponse::text(404, "not found"),
        }
    })
    .await
}

/// Configuration pointing at the mock backends with fast timings.
pub fn test_config(indexer: &MockServer, signer: &MockServer) -> WalletConfig {
    let mut config = WalletConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.indexer.base_url = indexer.url();
    config.indexer.use_system_proxy = false;
    config.indexer.timeout_secs = 5;
    config.signer.base_url = signer.url();
    config.signer.organization_id = "org-test".to_string();
    config.signer.api_public_key = SENDER_PUBLIC_KEY.to_string();
    config.signer.api_private_key = SECRET_ONE.to_string();
    config.signer.public_key = SENDER_PUBLIC_KEY.to_string();
    config.signer.timeout_secs = 5;
    config.monitor.max_attempts = 5;
    config.monitor.poll_interval_ms = 20;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 40;
    config
}

/// Spawn the wallet API on an ephemeral port.
pub async fn spawn_wallet(config: WalletConfig) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = WalletServer::new(config, shutdown.clone()).unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    (addr, shutdown)
}

/// HTTP client that never routes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
