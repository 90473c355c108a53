// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity hashing.
//!
//! The lookup key written into an attestation at issuance time is
//! `keccak256(utf8(accountId ++ provider [++ canonical_json(metadata)]))`.
//! Query-time hashing must reproduce those bytes exactly, so the metadata
//! serialization is compact JSON with lexicographically sorted keys.
//! Issuers that serialize metadata in insertion order only match when their
//! keys were already sorted.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResolverError, Result};

/// External identity provider an account id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Discord,
    Google,
    /// The account id is itself a wallet address; no hashing or lookup.
    Address,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Discord => "discord",
            Provider::Google => "google",
            Provider::Address => "address",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ResolverError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "discord" => Ok(Provider::Discord),
            "google" => Ok(Provider::Google),
            "address" => Ok(Provider::Address),
            other => Err(ResolverError::Validation(format!(
                "unknown provider `{other}` (expected discord, google or address)"
            ))),
        }
    }
}

/// Input to a resolution call. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountIdentity {
    pub account_id: String,
    pub provider: Provider,
    pub metadata: Option<Value>,
}

impl AccountIdentity {
    pub fn new(provider: Provider, account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            provider,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn lookup_key(&self) -> Result<LookupKey> {
        generate_hash(&self.account_id, self.provider.as_str(), self.metadata.as_ref())
    }
}

/// Fixed-width digest used as a substring filter against indexer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupKey(B256);

impl LookupKey {
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex, the form the indexer stores.
    pub fn to_hex(&self) -> String {
        alloy::hex::encode_prefixed(self.0)
    }

    /// Compare against a hex string from decoded attestation data.
    pub fn matches_hex(&self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(&self.to_hex())
    }
}

impl From<B256> for LookupKey {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Keccak-256 over the UTF-8 bytes of `value`.
pub fn hash_string(value: &str) -> B256 {
    keccak256(value.as_bytes())
}

/// Compact JSON with sorted object keys at every depth.
pub fn canonical_json(value: &Value) -> Result<String> {
    serde_json::to_string(&sorted(value))
        .map_err(|e| ResolverError::Validation(format!("metadata could not be serialized: {e}")))
}

// Rebuilds objects in key order, independent of serde_json's map backing.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Derive the lookup key for an account.
pub fn generate_hash(account_id: &str, provider: &str, metadata: Option<&Value>) -> Result<LookupKey> {
    if account_id.is_empty() {
        return Err(ResolverError::Validation("Account ID is required.".to_string()));
    }
    if provider.is_empty() {
        return Err(ResolverError::Validation("Provider is required.".to_string()));
    }

    let preimage = match metadata {
        Some(metadata) => format!("{account_id}{provider}{}", canonical_json(metadata)?),
        None => format!("{account_id}{provider}"),
    };

    Ok(LookupKey(hash_string(&preimage)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_string_matches_known_keccak() {
        // keccak256("") is a well-known constant.
        assert_eq!(
            alloy::hex::encode_prefixed(hash_string("")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn hash_is_deterministic() {
        let a = generate_hash("973993299281076285", "discord", None).unwrap();
        let b = generate_hash("973993299281076285", "discord", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, LookupKey(hash_string("973993299281076285discord")));
        assert_eq!(a.to_hex().len(), 66);
    }

    #[test]
    fn provider_changes_the_key() {
        let discord = generate_hash("42", "discord", None).unwrap();
        let google = generate_hash("42", "google", None).unwrap();
        assert_ne!(discord, google);
    }

    #[test]
    fn metadata_is_hashed_canonically() {
        let m1 = json!({"b": 1, "a": {"y": true, "x": null}});
        let m1_reordered = json!({"a": {"x": null, "y": true}, "b": 1});
        let m2 = json!({"a": 2});

        let k1 = generate_hash("42", "google", Some(&m1)).unwrap();
        let k1b = generate_hash("42", "google", Some(&m1_reordered)).unwrap();
        let k2 = generate_hash("42", "google", Some(&m2)).unwrap();

        assert_eq!(k1, k1b);
        assert_ne!(k1, k2);
        assert_eq!(
            k1,
            LookupKey(hash_string(r#"42google{"a":{"x":null,"y":true},"b":1}"#))
        );
    }

    #[test]
    fn insertion_order_metadata_only_matches_when_sorted() {
        let metadata = json!({"b": 1, "a": 2});
        let key = generate_hash("42", "google", Some(&metadata)).unwrap();

        assert_ne!(key, LookupKey(hash_string(r#"42google{"b":1,"a":2}"#)));
        assert_eq!(key, LookupKey(hash_string(r#"42google{"a":2,"b":1}"#)));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            generate_hash("", "discord", None),
            Err(ResolverError::Validation(_))
        ));
        assert!(matches!(
            generate_hash("42", "", None),
            Err(ResolverError::Validation(_))
        ));
    }

    #[test]
    fn matches_hex_ignores_case() {
        let key = generate_hash("42", "discord", None).unwrap();
        assert!(key.matches_hex(&key.to_hex().to_uppercase().replacen("0X", "0x", 1)));
        assert!(!key.matches_hex("0x00"));
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Discord".parse::<Provider>().unwrap(), Provider::Discord);
        assert_eq!(" google ".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("address".parse::<Provider>().unwrap(), Provider::Address);
        assert!("twitter".parse::<Provider>().is_err());
    }

    #[test]
    fn account_identity_uses_provider_name() {
        let identity = AccountIdentity::new(Provider::Google, "user-1");
        assert_eq!(
            identity.lookup_key().unwrap(),
            generate_hash("user-1", "google", None).unwrap()
        );
    }
}
