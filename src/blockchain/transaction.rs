//! Token-transfer construction, signing hashes, and signature splicing.
//!
//! # Responsibilities
//! - Validate transfer parameters (amount, fee floor, recipient network, memo)
//! - Serialize transfers in the network's wire layout
//! - Derive the two-stage pre-sign hash handed to the remote signer
//! - Splice a raw (r, s, v) signature into the spending condition

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha512_256};
use std::fmt;
use thiserror::Error;

use crate::blockchain::address::{AddressError, Principal};
use crate::blockchain::types::{Network, Txid};
use crate::blockchain::wallet::SenderPublicKey;
use crate::signer::RawSignature;

/// Memo field width on the wire.
pub const MEMO_MAX_BYTES: usize = 34;

/// Micro-units per whole STX.
pub const MICRO_UNITS_PER_STX: u64 = 1_000_000;

const AUTH_TYPE_STANDARD: u8 = 0x04;
const HASH_MODE_P2PKH: u8 = 0x00;
const KEY_ENCODING_COMPRESSED: u8 = 0x00;
const KEY_ENCODING_UNCOMPRESSED: u8 = 0x01;
const ANCHOR_MODE_ANY: u8 = 0x03;
const POST_CONDITION_MODE_DENY: u8 = 0x02;
const PAYLOAD_TOKEN_TRANSFER: u8 = 0x00;
const PRINCIPAL_STANDARD: u8 = 0x05;
const PRINCIPAL_CONTRACT: u8 = 0x06;

/// Errors raised while building or signing a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Fee {fee} is below the network minimum of {minimum} micro-units")]
    FeeTooLow { fee: u64, minimum: u64 },

    #[error("Memo is {len} bytes; at most {} are allowed", MEMO_MAX_BYTES)]
    MemoTooLong { len: usize },

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),
}

/// Parse a decimal STX amount ("1.5") into micro-units without floating point.
pub fn parse_stx_amount(value: &str) -> Result<u64, TransactionError> {
    let value = value.trim();
    let invalid = |reason: &str| TransactionError::InvalidAmount(format!("'{}': {}", value, reason));

    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("empty"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }
    if fraction.len() > 6 {
        return Err(invalid("more than 6 fraction digits"));
    }

    let whole_units: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("too large"))?
    };
    let fraction_units: u64 = format!("{:0<6}", fraction)
        .parse()
        .map_err(|_| invalid("not a decimal number"))?;

    whole_units
        .checked_mul(MICRO_UNITS_PER_STX)
        .and_then(|units| units.checked_add(fraction_units))
        .ok_or_else(|| invalid("too large"))
}

/// Render micro-units as a decimal STX string with six fraction digits.
pub fn format_micro_stx(micro_units: u64) -> String {
    format!(
        "{}.{:06}",
        micro_units / MICRO_UNITS_PER_STX,
        micro_units % MICRO_UNITS_PER_STX
    )
}

/// 32-byte digest handed to the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigningHash(pub [u8; 32]);

impl SigningHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SigningHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for SigningHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Recoverable signature in wire order: `v ‖ r ‖ s`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MessageSignature(pub [u8; 65]);

impl MessageSignature {
    /// Placeholder used while computing the initial sighash.
    pub const EMPTY: MessageSignature = MessageSignature([0u8; 65]);

    /// Normalize a signer triple: r and s left-padded to 32 bytes, v as one byte.
    pub fn from_raw(raw: &RawSignature) -> Result<Self, TransactionError> {
        let v = parse_recovery_id(&raw.v)?;
        let r = parse_scalar("r", &raw.r)?;
        let s = parse_scalar("s", &raw.s)?;

        let mut bytes = [0u8; 65];
        bytes[0] = v;
        bytes[1..33].copy_from_slice(&r);
        bytes[33..].copy_from_slice(&s);
        Ok(Self(bytes))
    }

    /// Parse the 130-character hex form.
    pub fn from_hex(value: &str) -> Result<Self, TransactionError> {
        let mut bytes = [0u8; 65];
        hex::decode_to_slice(value, &mut bytes)
            .map_err(|e| TransactionError::InvalidSignatureFormat(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn recovery_id(&self) -> u8 {
        self.0[0]
    }

    /// `r ‖ s` without the recovery id.
    pub fn compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out.copy_from_slice(&self.0[1..]);
        out
    }

    /// 130 lowercase hex characters, no `0x`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Split back into a padded signer triple.
    pub fn to_raw(&self) -> RawSignature {
        RawSignature {
            r: hex::encode(&self.0[1..33]),
            s: hex::encode(&self.0[33..]),
            v: hex::encode([self.0[0]]),
        }
    }
}

impl fmt::Debug for MessageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "MessageSignature({}...)", &hex[..12])
    }
}

fn strip_hex_prefix(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

fn parse_scalar(name: &str, value: &str) -> Result<[u8; 32], TransactionError> {
    let digits = strip_hex_prefix(value);
    if digits.is_empty() {
        return Err(TransactionError::InvalidSignatureFormat(format!("{} is empty", name)));
    }
    if digits.len() > 64 {
        return Err(TransactionError::InvalidSignatureFormat(format!(
            "{} exceeds 32 bytes ({} hex chars)",
            name,
            digits.len()
        )));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TransactionError::InvalidSignatureFormat(format!(
            "{} is not hex",
            name
        )));
    }

    let padded = format!("{:0>64}", digits);
    let mut out = [0u8; 32];
    hex::decode_to_slice(padded, &mut out)
        .map_err(|e| TransactionError::InvalidSignatureFormat(e.to_string()))?;
    Ok(out)
}

fn parse_recovery_id(value: &str) -> Result<u8, TransactionError> {
    let digits = strip_hex_prefix(value);
    if digits.is_empty() || digits.len() > 2 {
        return Err(TransactionError::InvalidSignatureFormat(format!(
            "v must be one byte, got '{}'",
            value
        )));
    }
    let v = u8::from_str_radix(digits, 16).map_err(|_| {
        TransactionError::InvalidSignatureFormat(format!("v is not hex: '{}'", value))
    })?;
    if v > 3 {
        return Err(TransactionError::InvalidSignatureFormat(format!(
            "recovery id {} out of range",
            v
        )));
    }
    Ok(v)
}

/// Inputs to [`build_unsigned_transfer`].
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub recipient: String,
    pub amount_micro_units: u64,
    pub fee_micro_units: u64,
    pub nonce: u64,
    pub sender_public_key: SenderPublicKey,
    pub memo: Option<String>,
    pub network: Network,
}

/// Network fee floor, proportional to serialized size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub fee_rate_per_byte: u64,
}

impl FeePolicy {
    pub fn minimum_fee(&self, encoded_len: usize) -> u64 {
        (encoded_len as u64).saturating_mul(self.fee_rate_per_byte)
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            fee_rate_per_byte: 1,
        }
    }
}

/// A validated, not-yet-signed token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransfer {
    recipient: Principal,
    amount_micro_units: u64,
    fee_micro_units: u64,
    nonce: u64,
    sender_public_key: SenderPublicKey,
    memo: Option<String>,
    network: Network,
}

impl UnsignedTransfer {
    pub fn recipient(&self) -> &Principal {
        &self.recipient
    }

    pub fn amount_micro_units(&self) -> u64 {
        self.amount_micro_units
    }

    pub fn fee_micro_units(&self) -> u64 {
        self.fee_micro_units
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn sender_public_key(&self) -> &SenderPublicKey {
        &self.sender_public_key
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Serialized size; independent of the signature contents.
    pub fn encoded_len(&self) -> usize {
        self.encode(self.nonce, self.fee_micro_units, &MessageSignature::EMPTY)
            .len()
    }

    /// Base hash: the transaction with nonce, fee and signature cleared.
    pub fn initial_sighash(&self) -> [u8; 32] {
        let cleared = self.encode(0, 0, &MessageSignature::EMPTY);
        Sha512_256::digest(cleared).into()
    }

    /// Pre-sign hash: base hash layered with auth type, fee, and nonce.
    pub fn presign_hash(&self) -> SigningHash {
        let mut hasher = Sha512_256::new();
        hasher.update(self.initial_sighash());
        hasher.update([AUTH_TYPE_STANDARD]);
        hasher.update(self.fee_micro_units.to_be_bytes());
        hasher.update(self.nonce.to_be_bytes());
        SigningHash(hasher.finalize().into())
    }

    fn encode(&self, nonce: u64, fee: u64, signature: &MessageSignature) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        buf.push(self.network.transaction_version());
        buf.extend_from_slice(&self.network.chain_id().to_be_bytes());

        // Standard authorization with a single-signature spending condition.
        buf.push(AUTH_TYPE_STANDARD);
        buf.push(HASH_MODE_P2PKH);
        buf.extend_from_slice(&self.sender_public_key.hash160());
        buf.extend_from_slice(&nonce.to_be_bytes());
        buf.extend_from_slice(&fee.to_be_bytes());
        buf.push(if self.sender_public_key.is_compressed() {
            KEY_ENCODING_COMPRESSED
        } else {
            KEY_ENCODING_UNCOMPRESSED
        });
        buf.extend_from_slice(&signature.0);

        buf.push(ANCHOR_MODE_ANY);
        buf.push(POST_CONDITION_MODE_DENY);
        buf.extend_from_slice(&0u32.to_be_bytes());

        buf.push(PAYLOAD_TOKEN_TRANSFER);
        encode_principal(&mut buf, &self.recipient);
        buf.extend_from_slice(&self.amount_micro_units.to_be_bytes());
        buf.extend_from_slice(&encode_memo(self.memo.as_deref()));

        buf
    }
}

fn encode_principal(buf: &mut Vec<u8>, principal: &Principal) {
    match principal {
        Principal::Standard(address) => {
            buf.push(PRINCIPAL_STANDARD);
            buf.push(address.version);
            buf.extend_from_slice(&address.hash160);
        }
        Principal::Contract { address, name } => {
            buf.push(PRINCIPAL_CONTRACT);
            buf.push(address.version);
            buf.extend_from_slice(&address.hash160);
            // Contract names are at most 128 ASCII bytes.
            buf.push(name.len() as u8);
            buf.extend_from_slice(name.as_bytes());
        }
    }
}

fn encode_memo(memo: Option<&str>) -> [u8; MEMO_MAX_BYTES] {
    let mut out = [0u8; MEMO_MAX_BYTES];
    if let Some(memo) = memo {
        let bytes = memo.as_bytes();
        let len = bytes.len().min(MEMO_MAX_BYTES);
        out[..len].copy_from_slice(&bytes[..len]);
    }
    out
}

/// Validate parameters and produce the unsigned transfer with its pre-sign hash.
pub fn build_unsigned_transfer(
    params: TransferParams,
    policy: &FeePolicy,
) -> Result<(UnsignedTransfer, SigningHash), TransactionError> {
    if params.amount_micro_units == 0 {
        return Err(TransactionError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }

    if let Some(memo) = &params.memo {
        if memo.len() > MEMO_MAX_BYTES {
            return Err(TransactionError::MemoTooLong { len: memo.len() });
        }
    }

    let recipient = Principal::parse(&params.recipient, params.network)?;

    let transfer = UnsignedTransfer {
        recipient,
        amount_micro_units: params.amount_micro_units,
        fee_micro_units: params.fee_micro_units,
        nonce: params.nonce,
        sender_public_key: params.sender_public_key,
        memo: params.memo.filter(|m| !m.is_empty()),
        network: params.network,
    };

    let minimum = policy.minimum_fee(transfer.encoded_len());
    if transfer.fee_micro_units < minimum {
        return Err(TransactionError::FeeTooLow {
            fee: transfer.fee_micro_units,
            minimum,
        });
    }

    let hash = transfer.presign_hash();
    tracing::debug!(
        recipient = %transfer.recipient,
        amount = transfer.amount_micro_units,
        fee = transfer.fee_micro_units,
        nonce = transfer.nonce,
        sighash = %hash,
        "Built unsigned transfer"
    );
    Ok((transfer, hash))
}

/// Attach a signer triple to the spending condition.
pub fn splice_signature(
    unsigned: UnsignedTransfer,
    raw: &RawSignature,
) -> Result<SignedTransaction, TransactionError> {
    let signature = MessageSignature::from_raw(raw)?;
    Ok(SignedTransaction {
        transfer: unsigned,
        signature,
    })
}

/// A transfer with its signature embedded. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    transfer: UnsignedTransfer,
    signature: MessageSignature,
}

impl SignedTransaction {
    pub fn transfer(&self) -> &UnsignedTransfer {
        &self.transfer
    }

    pub fn signature(&self) -> &MessageSignature {
        &self.signature
    }

    /// Wire bytes for broadcast.
    pub fn serialize(&self) -> Vec<u8> {
        self.transfer.encode(
            self.transfer.nonce,
            self.transfer.fee_micro_units,
            &self.signature,
        )
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn txid(&self) -> Txid {
        Txid(Sha512_256::digest(self.serialize()).into())
    }
}
