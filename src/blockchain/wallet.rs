//! Sender account: public key, derived address, and signature recovery.
//!
//! # Security
//! - The wallet never holds private key material; signing is delegated to the
//!   custodial signer
//! - Only public keys and addresses are logged

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::blockchain::address::{hash160, StacksAddress};
use crate::blockchain::transaction::{MessageSignature, SigningHash};
use crate::blockchain::types::Network;
use crate::blockchain::AddressError;

/// A secp256k1 public key together with the encoding it was supplied in.
///
/// The encoding matters: hash160 is taken over the exact bytes, and the
/// transaction records whether the key is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderPublicKey {
    key: secp256k1::PublicKey,
    compressed: bool,
}

impl SenderPublicKey {
    /// Parse a 33-byte compressed or 65-byte uncompressed SEC1 point.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let compressed = match bytes.len() {
            33 => true,
            65 => false,
            n => {
                return Err(AddressError::InvalidPublicKey(format!(
                    "expected 33 or 65 bytes, got {}",
                    n
                )))
            }
        };
        let key = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|e| AddressError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { key, compressed })
    }

    /// Parse a hex string, with or without `0x`.
    pub fn from_hex(value: &str) -> Result<Self, AddressError> {
        let digits = value.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let bytes =
            hex::decode(digits).map_err(|e| AddressError::InvalidPublicKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Key bytes in their original encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.key.serialize().to_vec()
        } else {
            self.key.serialize_uncompressed().to_vec()
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.to_bytes())
    }
}

impl fmt::Display for SenderPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for SenderPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The custodial account this service sends from.
///
/// The address is always derived from the key; it is cached here, never configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    public_key: SenderPublicKey,
    address: StacksAddress,
    network: Network,
}

impl Account {
    pub fn new(public_key: SenderPublicKey, network: Network) -> Self {
        let address = StacksAddress::from_public_key(&public_key, network);
        tracing::debug!(address = %address, network = %network, "Account derived");
        Self {
            public_key,
            address,
            network,
        }
    }

    pub fn from_public_key_hex(public_key: &str, network: Network) -> Result<Self, AddressError> {
        Ok(Self::new(SenderPublicKey::from_hex(public_key)?, network))
    }

    pub fn public_key(&self) -> &SenderPublicKey {
        &self.public_key
    }

    pub fn address(&self) -> &StacksAddress {
        &self.address
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

/// Recover the public key that produced `signature` over `hash`.
///
/// The returned key uses the requested encoding so it can be compared
/// byte-for-byte with the sender key.
pub fn recover_public_key(
    hash: &SigningHash,
    signature: &MessageSignature,
    compressed: bool,
) -> Option<SenderPublicKey> {
    let recovery_id = RecoveryId::from_i32(i32::from(signature.recovery_id())).ok()?;
    let recoverable = RecoverableSignature::from_compact(&signature.compact(), recovery_id).ok()?;
    let message = Message::from_digest(*hash.as_bytes());

    let key = Secp256k1::verification_only()
        .recover_ecdsa(&message, &recoverable)
        .ok()?;
    Some(SenderPublicKey { key, compressed })
}

/// Whether `signature` over `hash` was produced by `public_key`.
pub fn verify_signature(
    public_key: &SenderPublicKey,
    hash: &SigningHash,
    signature: &MessageSignature,
) -> bool {
    recover_public_key(hash, signature, public_key.is_compressed())
        .map(|recovered| recovered == *public_key)
        .unwrap_or(false)
}
