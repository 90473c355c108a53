// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session-signature construction.
//!
//! A session is authorized in two steps:
//!
//! 1. The app wallet signs an EIP-4361 (SIWE) challenge built from the
//!    session URI, expiration, requested resources and a nonce taken from
//!    the network's latest blockhash. The resources are carried as a ReCap
//!    URN. The result is an [`AuthSig`].
//! 2. An ephemeral ed25519 session key signs the capability payload that
//!    embeds the auth sig. That signature is what each decrypt call presents.
//!
//! The network recomputes the challenge, so the message layout below must
//! not drift.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signer as _, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ResolverError, Result};

/// Session lifetime requested from the network, in hours.
pub const SESSION_TTL_HOURS: i64 = 24;

const SIWE_DOMAIN: &str = "localhost";
const SIWE_CHAIN_ID: u64 = 1;
const SESSION_URI_PREFIX: &str = "lit:session:";
const RECAP_PREFIX: &str = "urn:recap:";

/// Resource prefix for access-control-condition decryption.
pub const ACC_RESOURCE_PREFIX: &str = "lit-accesscontrolcondition";
pub const DECRYPTION_ABILITY: &str = "access-control-condition-decryption";

/// A capability requested for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAbilityRequest {
    /// Resource key, `*` for every resource.
    pub resource: String,
    pub resource_prefix: String,
    pub ability: String,
}

impl ResourceAbilityRequest {
    /// Decryption of any access-control-condition-bound ciphertext.
    pub fn decrypt_any() -> Self {
        Self {
            resource: "*".to_string(),
            resource_prefix: ACC_RESOURCE_PREFIX.to_string(),
            ability: DECRYPTION_ABILITY.to_string(),
        }
    }

    pub fn resource_uri(&self) -> String {
        format!("{}://{}", self.resource_prefix, self.resource)
    }

    /// ReCap namespace/ability pair for this request.
    fn recap_ability(&self) -> (&'static str, &'static str) {
        match self.ability.as_str() {
            DECRYPTION_ABILITY => ("Threshold", "Decryption"),
            _ => ("Threshold", "Execution"),
        }
    }
}

/// Wallet signature over the SIWE challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    pub sig: String,
    pub derived_via: String,
    pub signed_message: String,
    pub address: String,
}

/// Session-key signature presented to one network endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSig {
    pub sig: String,
    pub derived_via: String,
    pub signed_message: String,
    pub address: String,
    pub algo: String,
}

/// Session signatures keyed by endpoint.
pub type SessionSigs = BTreeMap<String, SessionSig>;

/// Inputs handed to the auth callback.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthNeededParams {
    pub uri: String,
    pub expiration: String,
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
    pub nonce: String,
}

/// Everything that shapes one session signature.
#[derive(Debug, Clone)]
pub struct SessionRequest<'a> {
    pub session_key: &'a SigningKey,
    pub endpoint: &'a str,
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

/// JS-style ISO-8601 timestamp (`2024-01-01T00:00:00.000Z`).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn session_uri(session_key: &SigningKey) -> String {
    format!(
        "{SESSION_URI_PREFIX}{}",
        alloy::hex::encode(session_key.verifying_key().as_bytes())
    )
}

/// `urn:recap:` resource for the requested abilities.
pub fn recap_resource(requests: &[ResourceAbilityRequest]) -> Result<String> {
    let mut att: BTreeMap<String, BTreeMap<String, Vec<serde_json::Value>>> = BTreeMap::new();
    for request in requests {
        let (namespace, name) = request.recap_ability();
        att.entry(request.resource_uri())
            .or_default()
            .insert(format!("{namespace}/{name}"), vec![json!({})]);
    }

    let body = serde_json::to_vec(&json!({ "att": att, "prf": [] }))
        .map_err(|e| ResolverError::Decryption(format!("failed to encode recap: {e}")))?;
    Ok(format!("{RECAP_PREFIX}{}", Base64UrlUnpadded::encode_string(&body)))
}

/// Human-readable ReCap statement for the abilities.
fn recap_statement(requests: &[ResourceAbilityRequest]) -> String {
    let mut statement =
        String::from("I further authorize the stated URI to perform the following actions on my behalf:");
    for (index, request) in requests.iter().enumerate() {
        let (namespace, name) = request.recap_ability();
        statement.push_str(&format!(
            " ({}) '{namespace}': '{name}' for '{}'.",
            index + 1,
            request.resource_uri()
        ));
    }
    statement
}

/// Build the EIP-4361 challenge the wallet signs.
pub fn create_siwe_message(
    params: &AuthNeededParams,
    wallet: Address,
    issued_at: DateTime<Utc>,
) -> Result<String> {
    let resource = recap_resource(&params.resource_ability_requests)?;
    Ok(format!(
        "{SIWE_DOMAIN} wants you to sign in with your Ethereum account:\n\
         {address}\n\
         \n\
         {statement}\n\
         \n\
         URI: {uri}\n\
         Version: 1\n\
         Chain ID: {SIWE_CHAIN_ID}\n\
         Nonce: {nonce}\n\
         Issued At: {issued_at}\n\
         Expiration Time: {expiration}\n\
         Resources:\n\
         - {resource}",
        address = wallet.to_checksum(None),
        statement = recap_statement(&params.resource_ability_requests),
        uri = params.uri,
        nonce = params.nonce,
        issued_at = iso_timestamp(issued_at),
        expiration = params.expiration,
    ))
}

/// EIP-191 personal-sign of the challenge.
pub fn generate_auth_sig(signer: &PrivateKeySigner, to_sign: String) -> Result<AuthSig> {
    let signature = signer
        .sign_message_sync(to_sign.as_bytes())
        .map_err(|e| ResolverError::Decryption(format!("failed to sign session challenge: {e}")))?;

    Ok(AuthSig {
        sig: alloy::hex::encode_prefixed(signature.as_bytes()),
        derived_via: "web3.eth.personal.sign".to_string(),
        signed_message: to_sign,
        address: signer.address().to_checksum(None),
    })
}

/// Produce session signatures, asking `auth_needed` for the wallet's auth sig.
pub fn get_session_sigs<F>(request: SessionRequest<'_>, auth_needed: F) -> Result<SessionSigs>
where
    F: FnOnce(AuthNeededParams) -> Result<AuthSig>,
{
    let expiration = iso_timestamp(request.issued_at + chrono::Duration::hours(SESSION_TTL_HOURS));

    let auth_sig = auth_needed(AuthNeededParams {
        uri: session_uri(request.session_key),
        expiration: expiration.clone(),
        resource_ability_requests: request.resource_ability_requests.clone(),
        nonce: request.nonce,
    })?;

    let session_key_hex = alloy::hex::encode(request.session_key.verifying_key().as_bytes());
    let payload = json!({
        "sessionKey": session_key_hex,
        "resourceAbilityRequests": request.resource_ability_requests,
        "capabilities": [auth_sig],
        "issuedAt": iso_timestamp(request.issued_at),
        "expiration": expiration,
        "nodeAddress": request.endpoint,
    });
    let signed_message = serde_json::to_string(&payload)
        .map_err(|e| ResolverError::Decryption(format!("failed to encode session payload: {e}")))?;

    let signature = request.session_key.sign(signed_message.as_bytes());

    let mut sigs = SessionSigs::new();
    sigs.insert(
        request.endpoint.to_string(),
        SessionSig {
            sig: alloy::hex::encode(signature.to_bytes()),
            derived_via: "litSessionSignViaNacl".to_string(),
            signed_message,
            address: session_key_hex,
            algo: "ed25519".to_string(),
        },
    );
    Ok(sigs)
}

/// The standard callback: sign the SIWE challenge with the app wallet.
pub fn wallet_auth_callback(
    signer: &PrivateKeySigner,
    issued_at: DateTime<Utc>,
) -> impl FnOnce(AuthNeededParams) -> Result<AuthSig> + '_ {
    move |params| {
        let to_sign = create_siwe_message(&params, signer.address(), issued_at)?;
        generate_auth_sig(signer, to_sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ed25519_dalek::{Signature, Verifier};

    const TEST_KEY: &str = "0x1c1bca6747c0673525739b2318bef79eed53542c2928edfdbd30ff8bc2626192";

    fn signer() -> PrivateKeySigner {
        crate::blockchain::signer_from_hex(TEST_KEY).unwrap()
    }

    fn session_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn params() -> AuthNeededParams {
        AuthNeededParams {
            uri: session_uri(&session_key()),
            expiration: iso_timestamp(issued_at() + chrono::Duration::hours(SESSION_TTL_HOURS)),
            resource_ability_requests: vec![ResourceAbilityRequest::decrypt_any()],
            nonce: "0xblockhash".to_string(),
        }
    }

    #[test]
    fn timestamps_use_millisecond_utc_form() {
        assert_eq!(iso_timestamp(issued_at()), "2026-10-19T12:00:00.000Z");
        assert_eq!(
            iso_timestamp(issued_at() + chrono::Duration::hours(SESSION_TTL_HOURS)),
            "2026-10-20T12:00:00.000Z"
        );
    }

    #[test]
    fn recap_encodes_decryption_ability() {
        let resource = recap_resource(&[ResourceAbilityRequest::decrypt_any()]).unwrap();
        let encoded = resource.strip_prefix(RECAP_PREFIX).unwrap();
        let decoded = Base64UrlUnpadded::decode_vec(encoded).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(
            value,
            json!({"att": {"lit-accesscontrolcondition://*": {"Threshold/Decryption": [{}]}}, "prf": []})
        );
    }

    #[test]
    fn siwe_message_has_the_expected_layout() {
        let wallet = signer().address();
        let message = create_siwe_message(&params(), wallet, issued_at()).unwrap();
        let lines: Vec<&str> = message.lines().collect();

        assert_eq!(lines[0], "localhost wants you to sign in with your Ethereum account:");
        assert_eq!(lines[1], wallet.to_checksum(None));
        assert_eq!(lines[2], "");
        assert!(lines[3].contains("'Threshold': 'Decryption' for 'lit-accesscontrolcondition://*'"));
        assert_eq!(lines[5], format!("URI: {}", session_uri(&session_key())));
        assert_eq!(lines[6], "Version: 1");
        assert_eq!(lines[7], "Chain ID: 1");
        assert_eq!(lines[8], "Nonce: 0xblockhash");
        assert_eq!(lines[9], "Issued At: 2026-10-19T12:00:00.000Z");
        assert_eq!(lines[10], "Expiration Time: 2026-10-20T12:00:00.000Z");
        assert_eq!(lines[11], "Resources:");
        assert!(lines[12].starts_with("- urn:recap:"));
    }

    #[test]
    fn auth_sig_recovers_to_the_wallet() {
        let signer = signer();
        let to_sign = create_siwe_message(&params(), signer.address(), issued_at()).unwrap();
        let auth_sig = generate_auth_sig(&signer, to_sign.clone()).unwrap();

        let bytes = alloy::hex::decode(&auth_sig.sig).unwrap();
        let signature = alloy::primitives::Signature::try_from(bytes.as_slice()).unwrap();
        let recovered = signature.recover_address_from_msg(to_sign.as_bytes()).unwrap();

        assert_eq!(recovered, signer.address());
        assert_eq!(auth_sig.address, signer.address().to_checksum(None));
        assert_eq!(auth_sig.derived_via, "web3.eth.personal.sign");
    }

    #[test]
    fn session_sigs_embed_auth_sig_and_verify() {
        let signer = signer();
        let key = session_key();
        let mut seen = None;

        let sigs = get_session_sigs(
            SessionRequest {
                session_key: &key,
                endpoint: "https://node.example",
                resource_ability_requests: vec![ResourceAbilityRequest::decrypt_any()],
                nonce: "0xblockhash".to_string(),
                issued_at: issued_at(),
            },
            |params| {
                seen = Some(params.clone());
                wallet_auth_callback(&signer, issued_at())(params)
            },
        )
        .unwrap();

        let params = seen.expect("callback should run");
        assert_eq!(params.nonce, "0xblockhash");
        assert_eq!(params.expiration, "2026-10-20T12:00:00.000Z");
        assert_eq!(params.uri, session_uri(&key));

        let sig = &sigs["https://node.example"];
        assert_eq!(sig.algo, "ed25519");
        let payload: serde_json::Value = serde_json::from_str(&sig.signed_message).unwrap();
        assert_eq!(payload["nodeAddress"], "https://node.example");
        assert_eq!(
            payload["capabilities"][0]["address"],
            signer.address().to_checksum(None)
        );

        let raw: [u8; 64] = alloy::hex::decode(&sig.sig).unwrap().try_into().unwrap();
        key.verifying_key()
            .verify(sig.signed_message.as_bytes(), &Signature::from_bytes(&raw))
            .unwrap();
    }

    #[test]
    fn callback_failure_aborts_signing() {
        let key = session_key();
        let result = get_session_sigs(
            SessionRequest {
                session_key: &key,
                endpoint: "https://node.example",
                resource_ability_requests: vec![ResourceAbilityRequest::decrypt_any()],
                nonce: "n".to_string(),
                issued_at: issued_at(),
            },
            |_| Err(ResolverError::Decryption("wallet locked".into())),
        );
        assert!(matches!(result, Err(ResolverError::Decryption(_))));
    }
}
