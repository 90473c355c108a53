// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM chain integration.
//!
//! This module provides functionality for:
//! - Read-only permission checks against the OID permission manager
//! - App key loading and wallet address validation

pub mod permission;
pub mod signing;

pub use permission::{OidPermissionManager, PermissionOracle};
pub use signing::{is_valid_address, parse_address, signer_from_hex};
