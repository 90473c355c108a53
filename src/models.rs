// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Result Models
//!
//! Records returned by the resolver. All serialize with camelCase keys so
//! they can be handed to JSON consumers unchanged.

use serde::{Deserialize, Serialize};

// =============================================================================
// Profiles
// =============================================================================

/// Decrypted linked-account payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub provider: String,
    pub id: String,
}

/// One resolved profile and the attestation it was decrypted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub attestation_id: String,
    pub profile: Profile,
}

// =============================================================================
// Attestation listings
// =============================================================================

/// Attestation of a recipient, listed without decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationSummary {
    pub attestation_id: String,
    /// `provider` field of the attestation, when present.
    pub provider: Option<String>,
}
