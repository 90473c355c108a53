// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! App key handling and address validation.
//!
//! The querying application is identified by a secp256k1 key. Its address is
//! the account the permission manager is asked about, and the key signs the
//! decryption network's session challenge.

use std::str::FromStr;

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use k256::SecretKey;

use crate::error::{ResolverError, Result};

/// Parse a private key from PEM (SEC1 or PKCS#8) to hex.
///
/// # Returns
/// * `Ok(String)` - Hex-encoded private key (64 characters, no 0x prefix)
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| ResolverError::Configuration(format!("Invalid UTF-8 in key file: {e}")))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| ResolverError::Configuration(format!("Invalid PEM: {e}")))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| parse_pkcs8_to_secret_key(pem.contents()))
        .map_err(|e| ResolverError::Configuration(format!("Invalid key format: {e}")))?;

    Ok(alloy::hex::encode(secret_key.to_bytes()))
}

fn parse_pkcs8_to_secret_key(der: &[u8]) -> std::result::Result<SecretKey, String> {
    use k256::pkcs8::DecodePrivateKey;
    SecretKey::from_pkcs8_der(der).map_err(|e| e.to_string())
}

/// Create a signer from a hex private key, with or without `0x`.
pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner> {
    let trimmed = private_key_hex.trim();
    let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let key_bytes = alloy::hex::decode(raw)
        .map_err(|e| ResolverError::Configuration(format!("Invalid app private key: {e}")))?;

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| ResolverError::Configuration(format!("Invalid app private key: {e}")))
}

/// Parse a wallet address.
///
/// All-lowercase and all-uppercase hex are accepted as is; mixed case must
/// carry a valid EIP-55 checksum.
pub fn parse_address(raw: &str) -> Result<Address> {
    let invalid = || {
        ResolverError::Validation(format!(
            "The provided account ID `{raw}` is not a valid wallet address."
        ))
    };

    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());

    if has_lower && has_upper {
        Address::parse_checksummed(trimmed, None).map_err(|_| invalid())
    } else {
        Address::from_str(trimmed).map_err(|_| invalid())
    }
}

pub fn is_valid_address(raw: &str) -> bool {
    parse_address(raw).is_ok()
}
