// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolution errors.
//!
//! Every failure surfaced by the resolver maps to one variant here. Callers
//! can branch on the variant or use [`ResolverError::stage`] for a stable
//! machine-readable code. A permission *denial* is not an error; it only
//! shrinks the result set.

/// Convenience alias used across the crate.
pub type Result<T, E = ResolverError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// Bad input shape, detected before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No static configuration exists for the chain id.
    #[error("Unsupported chain id: {0}")]
    UnsupportedChain(u64),

    /// Resolver was built without a required setting (signing key, chain).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or HTTP-level failure talking to the attestation indexer.
    #[error("Indexer request failed: {0}")]
    IndexerRequest(String),

    /// No matching attestation or recipient could be found.
    #[error("Lookup error: {0}")]
    NotFound(String),

    /// Attestation payload does not match the configured schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A permissioned attestation is missing a required field.
    #[error("Data error: attestation {attestation_id}: {reason}")]
    DataIntegrity {
        attestation_id: String,
        reason: String,
    },

    /// Permission oracle RPC failure. Indeterminate, never "denied".
    #[error("Permission check failed for key {key}: {reason}")]
    PermissionCheck { key: String, reason: String },

    /// Could not establish a session with the decryption network.
    #[error("Decryption network connection failed: {0}")]
    Connection(String),

    /// Session signing or decryption failed.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The caller-supplied cancellation token fired.
    #[error("Resolution cancelled")]
    Cancelled,
}

impl ResolverError {
    /// Stable code for the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            ResolverError::Validation(_) => "validation",
            ResolverError::UnsupportedChain(_) => "unsupported_chain",
            ResolverError::Configuration(_) => "configuration",
            ResolverError::IndexerRequest(_) => "indexer_request",
            ResolverError::NotFound(_) => "not_found",
            ResolverError::SchemaMismatch(_) => "schema_mismatch",
            ResolverError::DataIntegrity { .. } => "data_integrity",
            ResolverError::PermissionCheck { .. } => "permission_check",
            ResolverError::Connection(_) => "connection",
            ResolverError::Decryption(_) => "decryption",
            ResolverError::Cancelled => "cancelled",
        }
    }

    /// Attestation the error refers to, when it is attestation-scoped.
    pub fn attestation_id(&self) -> Option<&str> {
        match self {
            ResolverError::DataIntegrity { attestation_id, .. } => Some(attestation_id),
            _ => None,
        }
    }

    pub(crate) fn data_integrity(attestation_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            attestation_id: attestation_id.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_codes_are_stable() {
        assert_eq!(ResolverError::Validation("x".into()).stage(), "validation");
        assert_eq!(ResolverError::UnsupportedChain(1).stage(), "unsupported_chain");
        assert_eq!(
            ResolverError::data_integrity("0xabc", "missing secret").stage(),
            "data_integrity"
        );
        assert_eq!(ResolverError::Cancelled.stage(), "cancelled");
    }

    #[test]
    fn data_integrity_names_the_attestation() {
        let err = ResolverError::data_integrity("0xabc", "missing 'secret' field");
        assert_eq!(err.attestation_id(), Some("0xabc"));
        assert_eq!(
            err.to_string(),
            "Data error: attestation 0xabc: missing 'secret' field"
        );
    }

    #[test]
    fn permission_check_message_includes_key() {
        let err = ResolverError::PermissionCheck {
            key: "0x01".into(),
            reason: "timeout".into(),
        };
        assert!(err.to_string().contains("0x01"));
        assert!(err.attestation_id().is_none());
    }
}
