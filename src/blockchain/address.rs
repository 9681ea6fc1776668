//! Address derivation and recipient parsing.
//!
//! An address is a pure function of (public key, network):
//! `"S" + c32check(version, RIPEMD160(SHA256(key)))`.

use ripemd::Ripemd160;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

use crate::blockchain::c32::{c32check_decode, c32check_encode, C32Error};
use crate::blockchain::types::Network;
use crate::blockchain::wallet::SenderPublicKey;

/// Longest contract name the network accepts.
pub const MAX_CONTRACT_NAME_LEN: usize = 128;

/// Errors raised while deriving or parsing addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Address '{address}' does not belong to {network}")]
    WrongNetwork { address: String, network: Network },
}

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Derive the single-signature address for a public key.
pub fn derive_address(public_key: &[u8], network: Network) -> Result<String, AddressError> {
    let key = SenderPublicKey::from_slice(public_key)?;
    Ok(StacksAddress::from_public_key(&key, network).to_string())
}

/// Version byte plus 20-byte hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StacksAddress {
    pub version: u8,
    pub hash160: [u8; 20],
}

impl StacksAddress {
    pub fn from_public_key(key: &SenderPublicKey, network: Network) -> Self {
        Self {
            version: network.single_sig_version(),
            hash160: key.hash160(),
        }
    }

    /// Parse a c32check address, verifying the checksum.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let invalid = |reason: String| AddressError::InvalidAddress {
            address: value.to_string(),
            reason,
        };

        let body = value
            .strip_prefix('S')
            .or_else(|| value.strip_prefix('s'))
            .ok_or_else(|| invalid("missing 'S' prefix".to_string()))?;

        let (version, data) = c32check_decode(body).map_err(|e: C32Error| invalid(e.to_string()))?;
        if data.len() != 20 {
            return Err(invalid(format!("expected a 20-byte hash, got {}", data.len())));
        }

        let mut hash160 = [0u8; 20];
        hash160.copy_from_slice(&data);
        Ok(Self { version, hash160 })
    }

    /// Parse and require the version to belong to `network`.
    pub fn parse_for_network(value: &str, network: Network) -> Result<Self, AddressError> {
        let address = Self::parse(value)?;
        if !network.accepts_address_version(address.version) {
            return Err(AddressError::WrongNetwork {
                address: value.to_string(),
                network,
            });
        }
        Ok(address)
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Versions above 31 cannot be constructed through parsing or derivation.
        let encoded = c32check_encode(self.version, &self.hash160).map_err(|_| fmt::Error)?;
        write!(f, "S{}", encoded)
    }
}

impl Serialize for StacksAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Transfer recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Standard(StacksAddress),
    Contract { address: StacksAddress, name: String },
}

impl Principal {
    /// Parse `ADDRESS` or `ADDRESS.contract-name` for the given network.
    pub fn parse(value: &str, network: Network) -> Result<Self, AddressError> {
        let value = value.trim();
        match value.split_once('.') {
            None => Ok(Principal::Standard(StacksAddress::parse_for_network(
                value, network,
            )?)),
            Some((address, name)) => {
                let address = StacksAddress::parse_for_network(address, network)?;
                validate_contract_name(name).map_err(|reason| AddressError::InvalidAddress {
                    address: value.to_string(),
                    reason,
                })?;
                Ok(Principal::Contract {
                    address,
                    name: name.to_string(),
                })
            }
        }
    }

    pub fn address(&self) -> &StacksAddress {
        match self {
            Principal::Standard(address) => address,
            Principal::Contract { address, .. } => address,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Standard(address) => write!(f, "{}", address),
            Principal::Contract { address, name } => write!(f, "{}.{}", address, name),
        }
    }
}

fn validate_contract_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > MAX_CONTRACT_NAME_LEN {
        return Err(format!(
            "contract name must be 1..={} characters",
            MAX_CONTRACT_NAME_LEN
        ));
    }
    let mut chars = name.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if starts_alpha && rest_valid {
        Ok(())
    } else {
        Err(format!("invalid contract name '{}'", name))
    }
}
