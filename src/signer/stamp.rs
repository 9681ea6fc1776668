//! API request stamping.
//!
//! Each request body is signed with the configured API key pair and the
//! result travels in the `X-Stamp` header as base64url JSON.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, SignOnly};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::signer::types::{SignerError, SignerResult};

/// Header carrying the stamp.
pub const STAMP_HEADER: &str = "X-Stamp";

const STAMP_SCHEME: &str = "SIGNATURE_SCHEME_TK_API_SECP256K1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stamp<'a> {
    public_key: &'a str,
    signature: String,
    scheme: &'static str,
}

/// Signs request bodies with the API key pair.
pub struct ApiKeyStamper {
    secp: Secp256k1<SignOnly>,
    secret: SecretKey,
    public_key_hex: String,
}

impl ApiKeyStamper {
    /// Load the key pair, rejecting a public key that does not belong to the private key.
    pub fn new(public_key_hex: &str, private_key_hex: &str) -> SignerResult<Self> {
        let secp = Secp256k1::signing_only();

        let secret_bytes = hex::decode(private_key_hex.trim())
            .map_err(|_| SignerError::Config("API private key is not hex".to_string()))?;
        let secret = SecretKey::from_slice(&secret_bytes)
            .map_err(|_| SignerError::Config("API private key is not a valid secp256k1 scalar".to_string()))?;

        let derived = hex::encode(PublicKey::from_secret_key(&secp, &secret).serialize());
        let public_key_hex = public_key_hex.trim().to_ascii_lowercase();
        if derived != public_key_hex {
            return Err(SignerError::Config(
                "API public key does not match the API private key".to_string(),
            ));
        }

        Ok(Self {
            secp,
            secret,
            public_key_hex,
        })
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    /// Stamp for `body`: DER signature over SHA-256(body).
    pub fn stamp(&self, body: &[u8]) -> SignerResult<String> {
        let digest: [u8; 32] = Sha256::digest(body).into();
        let signature = self
            .secp
            .sign_ecdsa(&Message::from_digest(digest), &self.secret);

        let stamp = Stamp {
            public_key: &self.public_key_hex,
            signature: hex::encode(&*signature.serialize_der()),
            scheme: STAMP_SCHEME,
        };
        let json = serde_json::to_vec(&stamp)
            .map_err(|e| SignerError::Config(format!("failed to encode stamp: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }
}

impl std::fmt::Debug for ApiKeyStamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyStamper")
            .field("public_key", &self.public_key_hex)
            .finish_non_exhaustive()
    }
}
