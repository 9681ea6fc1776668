//! Crockford-style base32 ("c32") and the c32check address encoding.

use sha2::{Digest, Sha256};
use thiserror::Error;

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum C32Error {
    #[error("invalid c32 character '{0}'")]
    InvalidCharacter(char),

    #[error("input too short")]
    TooShort,

    #[error("checksum mismatch")]
    BadChecksum,

    #[error("version {0} out of range")]
    InvalidVersion(u8),
}

/// Encode bytes as c32, preserving leading zero bytes as leading '0' characters.
pub fn c32_encode(input: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(input.len() * 8 / 5 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u32 = 0;

    for &byte in input.iter().rev() {
        let low_bits_to_take = 5 - carry_bits;
        let low_bits = u16::from(byte) & ((1 << low_bits_to_take) - 1);
        out.push(C32_ALPHABET[((low_bits << carry_bits) + carry) as usize]);

        carry_bits = 8 + carry_bits - 5;
        carry = u16::from(byte) >> (8 - carry_bits);

        if carry_bits >= 5 {
            out.push(C32_ALPHABET[(carry & 0x1f) as usize]);
            carry_bits -= 5;
            carry >>= 5;
        }
    }

    if carry_bits > 0 {
        out.push(C32_ALPHABET[carry as usize]);
    }

    // Characters are collected least-significant first.
    while out.last() == Some(&C32_ALPHABET[0]) {
        out.pop();
    }
    for _ in input.iter().take_while(|&&b| b == 0) {
        out.push(C32_ALPHABET[0]);
    }

    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Decode c32 text, tolerating lowercase and the `O`/`I`/`L` look-alikes.
pub fn c32_decode(input: &str) -> Result<Vec<u8>, C32Error> {
    let values = input
        .chars()
        .map(c32_value)
        .collect::<Result<Vec<u8>, C32Error>>()?;

    let mut out = Vec::with_capacity(values.len() * 5 / 8 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u32 = 0;

    for &value in values.iter().rev() {
        carry += u16::from(value) << carry_bits;
        carry_bits += 5;
        if carry_bits >= 8 {
            out.push((carry & 0xff) as u8);
            carry_bits -= 8;
            carry >>= 8;
        }
    }
    if carry_bits > 0 {
        out.push(carry as u8);
    }

    while out.last() == Some(&0) {
        out.pop();
    }
    for _ in values.iter().take_while(|&&v| v == 0) {
        out.push(0);
    }

    out.reverse();
    Ok(out)
}

fn c32_value(c: char) -> Result<u8, C32Error> {
    let normalized = match c.to_ascii_uppercase() {
        'O' => '0',
        'I' | 'L' => '1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|&a| char::from(a) == normalized)
        .map(|p| p as u8)
        .ok_or(C32Error::InvalidCharacter(c))
}

fn checksum(version: u8, data: &[u8]) -> [u8; 4] {
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hasher.update(data);
    let second = Sha256::digest(hasher.finalize());

    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// c32check: version character followed by c32(data ‖ checksum).
pub fn c32check_encode(version: u8, data: &[u8]) -> Result<String, C32Error> {
    if version >= 32 {
        return Err(C32Error::InvalidVersion(version));
    }

    let mut payload = data.to_vec();
    payload.extend_from_slice(&checksum(version, data));

    let mut out = String::with_capacity(payload.len() * 2);
    out.push(char::from(C32_ALPHABET[version as usize]));
    out.push_str(&c32_encode(&payload));
    Ok(out)
}

/// Inverse of [`c32check_encode`], verifying the checksum.
pub fn c32check_decode(input: &str) -> Result<(u8, Vec<u8>), C32Error> {
    let mut chars = input.chars();
    let version_char = chars.next().ok_or(C32Error::TooShort)?;
    let version = c32_value(version_char)?;

    let decoded = c32_decode(chars.as_str())?;
    if decoded.len() < 4 {
        return Err(C32Error::TooShort);
    }

    let (data, sum) = decoded.split_at(decoded.len() - 4);
    if checksum(version, data) != sum {
        return Err(C32Error::BadChecksum);
    }
    Ok((version, data.to_vec()))
}
