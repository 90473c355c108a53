// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OCI Resolver - Confidential Linked-Identity Profiles
//!
//! This crate resolves the profiles (Discord, Google, wallet) linked to an
//! account from EAS attestations. Access is gated by an on-chain permission
//! manager and the profile payload is revealed by a threshold-decryption
//! network.
//!
//! ## Modules
//!
//! - `resolver` - Orchestrates lookup, permission checks and decryption
//! - `indexer` - EAS GraphQL attestation indexer client
//! - `blockchain` - OID permission manager and app key handling
//! - `decryption` - Decryption network session (SIWE/ReCap session signatures)
//! - `schema` - Attestation schema codec
//! - `identity` - Account identities and lookup-key hashing
//! - `config` - Chain registry and resolver settings

pub mod blockchain;
pub mod config;
pub mod decryption;
pub mod error;
pub mod identity;
pub mod indexer;
pub mod models;
pub mod resolver;
pub mod schema;
pub mod telemetry;

pub use config::{ChainRegistry, ResolverConfig};
pub use error::{ResolverError, Result};
pub use identity::{AccountIdentity, Provider};
pub use models::{AttestationSummary, Profile, UserProfile};
pub use resolver::{DefaultProfileResolver, ProfileResolver};
