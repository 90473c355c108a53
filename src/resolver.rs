// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Profile Resolver
//!
//! Turns an `(provider, accountId)` pair into the linked profiles the app
//! is allowed to read.
//!
//! ## Pipeline
//!
//! 1. Require an app signing key.
//! 2. Resolve the recipient wallet: the account id itself for `address`,
//!    otherwise the attestation found by the hashed lookup key, whose
//!    recipient is read by a [`RecipientExtractor`].
//! 3. List the recipient's live attestations.
//! 4. Per attestation, in order: permission check on the `key` field,
//!    then `secret` extraction, decryption and profile parsing.
//!
//! A denied permission skips the attestation. Every other failure aborts
//! the call and discards profiles resolved so far. The permission key is a
//! decoded field, so a record that fails to decode aborts the call before
//! its permission is known.

use std::str::FromStr;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::blockchain::{parse_address, signer_from_hex, OidPermissionManager, PermissionOracle};
use crate::config::{ChainConfig, ChainRegistry, ResolverConfig};
use crate::decryption::{DecryptionSession, HttpDecryptionTransport, LitSession};
use crate::error::{ResolverError, Result};
use crate::identity::{AccountIdentity, Provider};
use crate::indexer::{Attestation, AttestationIndex, EasIndexerClient};
use crate::models::{AttestationSummary, Profile, UserProfile};
use crate::schema::{extract_str, DecodedField, SchemaCodec};

// =============================================================================
// Recipient extraction
// =============================================================================

/// Reads the recipient wallet from a lookup attestation's decoded fields.
pub trait RecipientExtractor {
    fn recipient(&self, fields: &[DecodedField]) -> Option<String>;
}

/// Recipient stored as the return-value test of the first unified access
/// control condition inside the `secret` envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessConditionRecipient;

impl RecipientExtractor for AccessConditionRecipient {
    fn recipient(&self, fields: &[DecodedField]) -> Option<String> {
        let secret: Value = serde_json::from_str(extract_str(fields, "secret")?).ok()?;
        secret
            .get("unifiedAccessControlConditions")?
            .as_array()?
            .iter()
            .find_map(|condition| {
                condition
                    .pointer("/returnValueTest/value")
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            })
    }
}

/// Recipient stored directly in a named schema field.
#[derive(Debug, Clone)]
pub struct SchemaFieldRecipient {
    field: String,
}

impl SchemaFieldRecipient {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl RecipientExtractor for SchemaFieldRecipient {
    fn recipient(&self, fields: &[DecodedField]) -> Option<String> {
        extract_str(fields, &self.field).map(str::to_string)
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolver wired to the live indexer, chain and decryption network.
pub type DefaultProfileResolver =
    ProfileResolver<EasIndexerClient, OidPermissionManager, LitSession<HttpDecryptionTransport>>;

/// Orchestrates indexer, permission oracle and decryption session.
///
/// The session is shared by every call on this instance and used under a
/// lock, so concurrent calls decrypt one at a time.
pub struct ProfileResolver<I, P, S> {
    chain: ChainConfig,
    codec: SchemaCodec,
    signer: Option<PrivateKeySigner>,
    indexer: I,
    oracle: P,
    session: Mutex<S>,
    recipients: Box<dyn RecipientExtractor + Send + Sync>,
}

impl DefaultProfileResolver {
    /// Build a resolver for `config.chain_id` from the registry.
    ///
    /// The signing key may be absent here; resolution then fails with
    /// [`ResolverError::Configuration`].
    pub fn from_config(config: ResolverConfig, registry: &ChainRegistry) -> Result<Self> {
        let chain_id = config.chain_id.ok_or_else(|| {
            ResolverError::Configuration("Chain ID is missing in configuration.".to_string())
        })?;
        let chain = registry.get(chain_id)?.clone();
        let timeout = config.http_timeout();

        let signer = config
            .app_private_key
            .as_deref()
            .map(signer_from_hex)
            .transpose()?;

        let indexer = EasIndexerClient::for_chain(&chain, config.indexer_url.as_deref(), timeout)?;
        let oracle = OidPermissionManager::new(&chain, config.rpc_url.as_deref())?;

        let mut session = LitSession::new(registry.clone(), HttpDecryptionTransport::new(timeout)?);
        if let Some(endpoint) = config.decryption_url {
            session = session.with_endpoint(endpoint);
        }

        tracing::info!(
            chain_id,
            indexer = %indexer.endpoint(),
            permission_manager = %oracle.address(),
            signer = ?signer.as_ref().map(|s| s.address()),
            "Profile resolver configured"
        );

        Self::with_parts(chain, signer, indexer, oracle, session)
    }
}

impl<I, P, S> ProfileResolver<I, P, S>
where
    I: AttestationIndex + Sync,
    P: PermissionOracle + Sync,
    S: DecryptionSession + Send,
{
    /// Assemble a resolver from its collaborators.
    pub fn with_parts(
        chain: ChainConfig,
        signer: Option<PrivateKeySigner>,
        indexer: I,
        oracle: P,
        session: S,
    ) -> Result<Self> {
        let codec = SchemaCodec::new(chain.schema_types)?;
        Ok(Self {
            chain,
            codec,
            signer,
            indexer,
            oracle,
            session: Mutex::new(session),
            recipients: Box::new(AccessConditionRecipient),
        })
    }

    /// Replace the recipient extraction strategy.
    pub fn with_recipient_extractor(
        mut self,
        extractor: impl RecipientExtractor + Send + Sync + 'static,
    ) -> Self {
        self.recipients = Box::new(extractor);
        self
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// Address the permission manager is asked about.
    pub fn app_address(&self) -> Option<Address> {
        self.signer.as_ref().map(PrivateKeySigner::address)
    }

    /// Profiles linked to `account_id` that this app may decrypt.
    pub async fn get_user_profiles(&self, provider: Provider, account_id: &str) -> Result<Vec<UserProfile>> {
        self.resolve(&AccountIdentity::new(provider, account_id)).await
    }

    /// [`Self::get_user_profiles`], aborted with [`ResolverError::Cancelled`] when `cancel` fires.
    pub async fn get_user_profiles_until(
        &self,
        provider: Provider,
        account_id: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<UserProfile>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(%provider, "Profile resolution cancelled");
                Err(ResolverError::Cancelled)
            }
            result = self.get_user_profiles(provider, account_id) => result,
        }
    }

    /// Resolve an identity, including optional hash metadata.
    pub async fn resolve(&self, identity: &AccountIdentity) -> Result<Vec<UserProfile>> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            ResolverError::Configuration(
                "App private key is missing in configuration.".to_string(),
            )
        })?;

        let recipient = self.resolve_recipient(identity).await?;

        let attestations = self.indexer.find_all(&recipient).await?;
        if attestations.is_empty() {
            tracing::info!(%recipient, "No attestations for recipient");
            return Ok(Vec::new());
        }

        let account = signer.address();
        let mut profiles = Vec::new();

        for attestation in &attestations {
            let fields = self.fields_of(attestation)?;
            let key = permission_key(attestation, &fields)?;

            if !self.oracle.has_permission(key, account).await? {
                tracing::info!(
                    attestation_id = %attestation.id,
                    account = %account,
                    "Permission denied, skipping decryption"
                );
                continue;
            }

            let secret = extract_str(&fields, "secret").ok_or_else(|| {
                ResolverError::data_integrity(
                    &attestation.id,
                    "does not contain a valid 'secret' field",
                )
            })?;

            let plaintext = {
                let mut session = self.session.lock().await;
                session.connect(self.chain.chain_id).await?;
                session.decrypt(self.chain.chain_id, signer, secret).await?
            };

            profiles.push(UserProfile {
                attestation_id: attestation.id.clone(),
                profile: parse_profile(&plaintext)?,
            });
        }

        tracing::info!(
            provider = %identity.provider,
            attestations = attestations.len(),
            resolved = profiles.len(),
            "Profiles resolved"
        );
        Ok(profiles)
    }

    /// Live attestations of a wallet with their provider, without permission
    /// checks or decryption.
    pub async fn get_user_attestations_by_recipient(
        &self,
        recipient: &str,
    ) -> Result<Vec<AttestationSummary>> {
        parse_address(recipient)?;

        self.indexer
            .find_all(recipient.trim())
            .await?
            .iter()
            .map(|attestation| {
                let fields = self.fields_of(attestation)?;
                Ok(AttestationSummary {
                    attestation_id: attestation.id.clone(),
                    provider: extract_str(&fields, "provider").map(str::to_string),
                })
            })
            .collect()
    }

    /// Disconnect the decryption session.
    pub async fn shutdown(&self) {
        self.session.lock().await.disconnect().await;
    }

    async fn resolve_recipient(&self, identity: &AccountIdentity) -> Result<String> {
        if identity.provider == Provider::Address {
            parse_address(&identity.account_id)?;
            return Ok(identity.account_id.trim().to_string());
        }

        let not_found = || {
            ResolverError::NotFound(format!(
                "Unable to find recipient wallet address for provider {} and account ID {}.",
                identity.provider, identity.account_id
            ))
        };

        let key = identity.lookup_key()?;
        let attestation = self
            .indexer
            .find_first(&key.to_hex())
            .await?
            .ok_or_else(not_found)?;

        let fields = self.fields_of(&attestation).map_err(|e| {
            tracing::warn!(attestation_id = %attestation.id, error = %e, "Lookup attestation undecodable");
            not_found()
        })?;

        let corroborated = extract_str(&fields, "key").is_some_and(|raw| key.matches_hex(raw))
            && extract_str(&fields, "provider") == Some(identity.provider.as_str());
        if !corroborated {
            tracing::warn!(
                attestation_id = %attestation.id,
                "Lookup attestation does not carry the expected key and provider"
            );
            return Err(not_found());
        }

        let recipient = self.recipients.recipient(&fields).ok_or_else(not_found)?;
        tracing::debug!(attestation_id = %attestation.id, %recipient, "Recipient resolved");
        Ok(recipient)
    }

    /// Decode from the raw payload, or from `decodedDataJson` when the
    /// indexer omitted it.
    fn fields_of(&self, attestation: &Attestation) -> Result<Vec<DecodedField>> {
        let raw = attestation.data.trim();
        let fields = if raw.is_empty() || raw == "0x" {
            SchemaCodec::parse_decoded_json(&attestation.decoded_data_json)
        } else {
            self.codec.decode_hex(raw)
        };

        fields.map_err(|e| match e {
            ResolverError::SchemaMismatch(reason) => {
                ResolverError::SchemaMismatch(format!("attestation {}: {reason}", attestation.id))
            }
            other => other,
        })
    }
}

fn permission_key(attestation: &Attestation, fields: &[DecodedField]) -> Result<B256> {
    let raw = extract_str(fields, "key").ok_or_else(|| {
        ResolverError::data_integrity(&attestation.id, "does not contain a valid 'key' field")
    })?;
    B256::from_str(raw).map_err(|e| {
        ResolverError::data_integrity(&attestation.id, format!("'key' is not a bytes32 value: {e}"))
    })
}

/// Parse decrypted bytes as `{id, provider}` JSON.
fn parse_profile(plaintext: &[u8]) -> Result<Profile> {
    let text = std::str::from_utf8(plaintext)
        .map_err(|e| ResolverError::Decryption(format!("plaintext is not UTF-8: {e}")))?;
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ResolverError::Decryption(format!("plaintext is not JSON: {e}")))?;

    let field = |name: &str| match value.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    match (field("id"), field("provider")) {
        (Some(id), Some(provider)) => Ok(Profile { provider, id }),
        _ => Err(ResolverError::Decryption(
            "plaintext is missing 'id' or 'provider'".to_string(),
        )),
    }
}
