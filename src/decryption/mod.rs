// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Decryption Network Session
//!
//! Authenticated session with a threshold-decryption network.
//!
//! ## State machine
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> SigningSession -> Decrypting -> Connected
//!       ^              |                                                        |
//!       +--- failure --+------------------------- disconnect() -----------------+
//! ```
//!
//! The chain id selects the named network profile. Requests go to the
//! configured gateway; connecting without one is a
//! [`ResolverError::Configuration`] error. A session connects once and is
//! reused; every decrypt obtains a fresh session signature whose nonce is
//! the network's latest blockhash. The state always settles back to
//! `Connected` or `Disconnected`, even when a call is dropped mid-flight.
//!
//! Decrypt failures always surface as [`ResolverError::Decryption`]. A
//! failed implicit connect keeps its [`ResolverError::Connection`] type.

pub mod auth;
pub mod transport;

use std::future::Future;

use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ChainRegistry, NetworkProfile};
use crate::error::{ResolverError, Result};

pub use auth::{AuthSig, ResourceAbilityRequest, SessionSig, SessionSigs};
pub use transport::{DecryptRequest, DecryptionTransport, Handshake, HttpDecryptionTransport};

/// Lifecycle of a [`LitSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    SigningSession,
    Decrypting,
}

/// Encrypted payload stored in an attestation's `secret` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiphertextEnvelope {
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control_conditions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_contract_conditions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sol_rpc_conditions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unified_access_control_conditions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl CiphertextEnvelope {
    /// Parse the JSON envelope; it must carry at least one condition set.
    pub fn parse(raw: &str) -> Result<Self> {
        let envelope: Self = serde_json::from_str(raw)
            .map_err(|e| ResolverError::Decryption(format!("invalid ciphertext envelope: {e}")))?;

        if envelope.ciphertext.is_empty() || envelope.data_to_encrypt_hash.is_empty() {
            return Err(ResolverError::Decryption(
                "ciphertext envelope is missing ciphertext or data hash".to_string(),
            ));
        }

        let has_conditions = [
            &envelope.access_control_conditions,
            &envelope.evm_contract_conditions,
            &envelope.sol_rpc_conditions,
            &envelope.unified_access_control_conditions,
        ]
        .iter()
        .any(|conditions| conditions.is_some());

        if !has_conditions {
            return Err(ResolverError::Decryption(
                "ciphertext envelope has no access control conditions".to_string(),
            ));
        }

        Ok(envelope)
    }
}

fn into_decryption_error(e: ResolverError) -> ResolverError {
    match e {
        ResolverError::Decryption(_) => e,
        other => ResolverError::Decryption(other.to_string()),
    }
}

/// Session with a decryption network.
pub trait DecryptionSession {
    fn state(&self) -> SessionState;

    /// Connect to the network serving `chain_id`. Reuses a live connection.
    fn connect(&mut self, chain_id: u64) -> impl Future<Output = Result<()>> + Send;

    /// Fresh session signatures authorizing decryption for `signer`.
    fn session_signature(
        &mut self,
        chain_id: u64,
        signer: &PrivateKeySigner,
    ) -> impl Future<Output = Result<SessionSigs>> + Send;

    /// Reveal the plaintext of a JSON ciphertext envelope.
    fn decrypt(
        &mut self,
        chain_id: u64,
        signer: &PrivateKeySigner,
        envelope: &str,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Drop the connection. A no-op when never connected.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

struct Connection {
    chain_id: u64,
    network: NetworkProfile,
    endpoint: String,
    latest_blockhash: String,
    session_key: SigningKey,
}

/// Sets an in-flight phase and restores a settled state when dropped, so a
/// cancelled call never leaves the session reporting a phase that is no
/// longer running.
struct Phase<'a> {
    state: &'a mut SessionState,
    settle: SessionState,
}

impl<'a> Phase<'a> {
    fn enter(state: &'a mut SessionState, phase: SessionState, settle: SessionState) -> Self {
        *state = phase;
        Self { state, settle }
    }

    fn settle(mut self, state: SessionState) {
        self.settle = state;
    }
}

impl Drop for Phase<'_> {
    fn drop(&mut self) {
        *self.state = self.settle;
    }
}

/// Lit-style session over a [`DecryptionTransport`].
///
/// No gateway is known for the built-in network profiles, so an endpoint
/// must be set with [`LitSession::with_endpoint`] before connecting.
pub struct LitSession<T> {
    registry: ChainRegistry,
    endpoint: Option<String>,
    transport: T,
    state: SessionState,
    connection: Option<Connection>,
}

impl<T> LitSession<T> {
    pub fn new(registry: ChainRegistry, transport: T) -> Self {
        Self {
            registry,
            endpoint: None,
            transport,
            state: SessionState::Disconnected,
            connection: None,
        }
    }

    /// Gateway serving the decryption network.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Network of the live connection, if any.
    pub fn network(&self) -> Option<&NetworkProfile> {
        self.connection.as_ref().map(|conn| &conn.network)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T> DecryptionSession for LitSession<T>
where
    T: DecryptionTransport + Send + Sync,
{
    fn state(&self) -> SessionState {
        self.state
    }

    async fn connect(&mut self, chain_id: u64) -> Result<()> {
        let network = self.registry.get(chain_id)?.decryption_network.clone();
        let endpoint = self.endpoint.clone().ok_or_else(|| {
            ResolverError::Configuration(format!(
                "no decryption gateway configured for network {} (set {})",
                network.name,
                crate::config::DECRYPTION_URL_ENV
            ))
        })?;

        if let Some(conn) = &self.connection {
            if conn.endpoint == endpoint && conn.network == network {
                return Ok(());
            }
            tracing::info!(
                from = conn.network.name,
                to = network.name,
                "Switching decryption network"
            );
        }

        self.connection = None;
        let phase = Phase::enter(
            &mut self.state,
            SessionState::Connecting,
            SessionState::Disconnected,
        );

        match self.transport.handshake(&endpoint).await {
            Ok(handshake) => {
                tracing::info!(
                    chain_id,
                    network = network.name,
                    endpoint = %endpoint,
                    "Connected to decryption network"
                );
                self.connection = Some(Connection {
                    chain_id,
                    network,
                    endpoint,
                    latest_blockhash: handshake.latest_blockhash,
                    session_key: SigningKey::generate(&mut rand::rngs::OsRng),
                });
                phase.settle(SessionState::Connected);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    chain_id,
                    network = network.name,
                    error = %e,
                    "Decryption network connection failed"
                );
                Err(match e {
                    ResolverError::Connection(_) => e,
                    other => ResolverError::Connection(other.to_string()),
                })
            }
        }
    }

    async fn session_signature(
        &mut self,
        chain_id: u64,
        signer: &PrivateKeySigner,
    ) -> Result<SessionSigs> {
        self.connect(chain_id).await?;
        let Some(conn) = self.connection.as_mut() else {
            return Err(ResolverError::Connection(
                "decryption network not connected".to_string(),
            ));
        };

        let _phase = Phase::enter(
            &mut self.state,
            SessionState::SigningSession,
            SessionState::Connected,
        );

        // The nonce must be the current chain head, not the one seen at connect time.
        let handshake = self.transport.handshake(&conn.endpoint).await.map_err(|e| {
            ResolverError::Decryption(format!("failed to refresh latest blockhash: {e}"))
        })?;
        conn.latest_blockhash = handshake.latest_blockhash;

        let issued_at = Utc::now();
        let sigs = auth::get_session_sigs(
            auth::SessionRequest {
                session_key: &conn.session_key,
                endpoint: &conn.endpoint,
                resource_ability_requests: vec![ResourceAbilityRequest::decrypt_any()],
                nonce: conn.latest_blockhash.clone(),
                issued_at,
            },
            auth::wallet_auth_callback(signer, issued_at),
        );

        tracing::debug!(
            chain_id = conn.chain_id,
            wallet = %signer.address(),
            "Session signature issued"
        );
        sigs
    }

    async fn decrypt(
        &mut self,
        chain_id: u64,
        signer: &PrivateKeySigner,
        envelope: &str,
    ) -> Result<Vec<u8>> {
        let mut envelope = CiphertextEnvelope::parse(envelope)?;

        self.connect(chain_id).await?;
        let session_sigs = self
            .session_signature(chain_id, signer)
            .await
            .map_err(into_decryption_error)?;

        if envelope.chain.is_none() {
            envelope.chain = Some(self.registry.get(chain_id)?.network_chain.to_string());
        }
        let Some(conn) = self.connection.as_ref() else {
            return Err(ResolverError::Connection(
                "decryption network not connected".to_string(),
            ));
        };

        let _phase = Phase::enter(
            &mut self.state,
            SessionState::Decrypting,
            SessionState::Connected,
        );
        self.transport
            .decrypt(
                &conn.endpoint,
                &DecryptRequest {
                    envelope,
                    session_sigs,
                },
            )
            .await
            .map_err(into_decryption_error)
    }

    async fn disconnect(&mut self) {
        match self.connection.take() {
            Some(conn) => {
                tracing::info!(network = conn.network.name, "Disconnected from decryption network");
            }
            None => {
                tracing::warn!("Disconnect requested but the decryption session was never connected");
            }
        }
        self.state = SessionState::Disconnected;
    }
}
