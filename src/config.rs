// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Per-chain constants (indexer endpoint, attester, schema, permission
//! manager, decryption network) live in an immutable [`ChainRegistry`]
//! resolved once when a resolver is built. Caller-specific settings come
//! from [`ResolverConfig`], either built in code or loaded from the
//! environment.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `OCI_CHAIN_ID` | Chain the attestations live on | Required |
//! | `OCI_APP_PRIVATE_KEY` | Hex secp256k1 key of the querying app | Optional |
//! | `OCI_APP_PRIVATE_KEY_PATH` | PEM file holding the app key | Optional |
//! | `OCI_RPC_URL` | Chain JSON-RPC endpoint override | Registry default |
//! | `OCI_INDEXER_URL` | EAS GraphQL endpoint override | Registry default |
//! | `OCI_DECRYPTION_URL` | Decryption gateway for the chain's network | Required to decrypt |
//! | `OCI_HTTP_TIMEOUT_SECS` | Timeout for outbound HTTP calls | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use crate::error::{ResolverError, Result};

pub const CHAIN_ID_ENV: &str = "OCI_CHAIN_ID";
pub const APP_PRIVATE_KEY_ENV: &str = "OCI_APP_PRIVATE_KEY";
pub const APP_PRIVATE_KEY_PATH_ENV: &str = "OCI_APP_PRIVATE_KEY_PATH";
pub const RPC_URL_ENV: &str = "OCI_RPC_URL";
pub const INDEXER_URL_ENV: &str = "OCI_INDEXER_URL";
pub const DECRYPTION_URL_ENV: &str = "OCI_DECRYPTION_URL";
pub const HTTP_TIMEOUT_ENV: &str = "OCI_HTTP_TIMEOUT_SECS";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Schema every supported chain registers its attestations under.
pub const SCHEMA_TYPES: &str = "bytes32 key, string provider, string secret, string metadata";

/// Named decryption network a chain maps to.
///
/// Only the name is fixed per chain. The gateway serving it is deployment
/// specific and must be configured with `OCI_DECRYPTION_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub name: &'static str,
}

pub const DATIL: NetworkProfile = NetworkProfile { name: "datil" };

pub const DATIL_DEV: NetworkProfile = NetworkProfile { name: "datil-dev" };

pub const DATIL_TEST: NetworkProfile = NetworkProfile { name: "datil-test" };

/// Static configuration for one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Chain name as the decryption network knows it.
    pub network_chain: &'static str,
    pub graphql_endpoint: &'static str,
    pub attester: &'static str,
    pub schema_id: &'static str,
    pub schema_types: &'static str,
    pub permission_manager: &'static str,
    pub rpc_url: &'static str,
    pub decryption_network: NetworkProfile,
}

pub const SEPOLIA: ChainConfig = ChainConfig {
    chain_id: 11155111,
    network_chain: "sepolia",
    graphql_endpoint: "https://sepolia.easscan.org/graphql",
    attester: "0x2d7B3e18D45846DA09D78e3644F15BD4aafa634d",
    schema_id: "0x85e90e3e16d319578888790af3284fea8bca549305071531e7478e3e0b5e7d6d",
    schema_types: SCHEMA_TYPES,
    permission_manager: "0x787aeDd9Fb3e16EeF5b00C0F35f105daD2A1aA15",
    rpc_url: "https://rpc.sepolia.org",
    decryption_network: DATIL,
};

pub const OPTIMISM_SEPOLIA: ChainConfig = ChainConfig {
    chain_id: 11155420,
    network_chain: "optimismSepolia",
    graphql_endpoint: "https://optimism-sepolia-bedrock.easscan.org/graphql",
    attester: "0xC2539c70dE7b24b9124e4E897083Ccc72e83c7c7",
    schema_id: "0x2c988095892ea57c600e5cc6fb62531502bc0c8d038ac39dc3fab161b6f122db",
    schema_types: SCHEMA_TYPES,
    permission_manager: "0xFcE488b93696Ec5e279b8257E67F074AbFEc59d8",
    rpc_url: "https://sepolia.optimism.io",
    decryption_network: DATIL_TEST,
};

pub const BASE_SEPOLIA: ChainConfig = ChainConfig {
    chain_id: 84532,
    network_chain: "baseSepolia",
    graphql_endpoint: "https://base-sepolia.easscan.org/graphql",
    attester: "0xC2539c70dE7b24b9124e4E897083Ccc72e83c7c7",
    schema_id: "0xe8c59f8de4cdf61c8ebefa3ed83d714acc767dda3bbff00623e73f5a8bf5255f",
    schema_types: SCHEMA_TYPES,
    permission_manager: "0xF65e300B0e622B1Bc224c7351397ea2FF29f1c3D",
    rpc_url: "https://sepolia.base.org",
    decryption_network: DATIL,
};

pub const ARBITRUM: ChainConfig = ChainConfig {
    chain_id: 42161,
    network_chain: "arbitrum",
    graphql_endpoint: "https://arbitrum.easscan.org/graphql",
    attester: "0xC2539c70dE7b24b9124e4E897083Ccc72e83c7c7",
    schema_id: "0x6b5b50f2de8b387664838bd3c751e21f6b9aac7cf4bf5b2fb86e760b89a8a22d",
    schema_types: SCHEMA_TYPES,
    permission_manager: "0x9a85Bb58CFb60ABd205c4Af7039fF73C86b41bd8",
    rpc_url: "https://arb1.arbitrum.io/rpc",
    decryption_network: DATIL,
};

/// Immutable chain id → configuration map.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainConfig>,
}

impl ChainRegistry {
    pub fn new(chains: impl IntoIterator<Item = ChainConfig>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.chain_id, c)).collect(),
        }
    }

    /// Chains with a deployed permission manager and schema.
    pub fn builtin() -> Self {
        Self::new([SEPOLIA, OPTIMISM_SEPOLIA, BASE_SEPOLIA, ARBITRUM])
    }

    pub fn get(&self, chain_id: u64) -> Result<&ChainConfig> {
        self.chains
            .get(&chain_id)
            .ok_or(ResolverError::UnsupportedChain(chain_id))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Caller settings for a resolver instance.
#[derive(Clone, Default)]
pub struct ResolverConfig {
    pub chain_id: Option<u64>,
    /// Hex secp256k1 key. Never logged.
    pub app_private_key: Option<String>,
    pub rpc_url: Option<String>,
    pub indexer_url: Option<String>,
    pub decryption_url: Option<String>,
    pub http_timeout: Option<Duration>,
}

impl std::fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("chain_id", &self.chain_id)
            .field("app_private_key", &self.app_private_key.as_ref().map(|_| "<redacted>"))
            .field("rpc_url", &self.rpc_url)
            .field("indexer_url", &self.indexer_url)
            .field("decryption_url", &self.decryption_url)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ResolverConfig {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id: Some(chain_id),
            ..Self::default()
        }
    }

    pub fn with_app_private_key(mut self, key: impl Into<String>) -> Self {
        self.app_private_key = Some(key.into());
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn with_indexer_url(mut self, url: impl Into<String>) -> Self {
        self.indexer_url = Some(url.into());
        self
    }

    pub fn with_decryption_url(mut self, url: impl Into<String>) -> Self {
        self.decryption_url = Some(url.into());
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT)
    }

    /// Load settings from `OCI_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let chain_id = get(CHAIN_ID_ENV)
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| {
                    ResolverError::Configuration(format!("{CHAIN_ID_ENV} is not a chain id: {e}"))
                })
            })
            .transpose()?;

        let app_private_key = match get(APP_PRIVATE_KEY_ENV) {
            Some(key) => Some(key),
            None => get(APP_PRIVATE_KEY_PATH_ENV)
                .map(|path| load_private_key_pem(&path))
                .transpose()?,
        };

        let http_timeout = get(HTTP_TIMEOUT_ENV)
            .map(|raw| {
                raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ResolverError::Configuration(format!("{HTTP_TIMEOUT_ENV} is not a number: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            chain_id,
            app_private_key,
            rpc_url: get(RPC_URL_ENV),
            indexer_url: get(INDEXER_URL_ENV),
            decryption_url: get(DECRYPTION_URL_ENV),
            http_timeout,
        })
    }
}

/// Read a PEM key file and return the key as 0x-prefixed hex.
fn load_private_key_pem(path: &str) -> Result<String> {
    let pem = fs::read(path)
        .map_err(|e| ResolverError::Configuration(format!("failed to read {path}: {e}")))?;
    let hex = crate::blockchain::signing::pem_to_hex(&pem)?;
    Ok(format!("0x{hex}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn builtin_registry_covers_deployed_chains() {
        let registry = ChainRegistry::builtin();
        assert_eq!(registry.chain_ids(), vec![42161, 84532, 11155111, 11155420]);
        assert_eq!(registry.get(11155111).unwrap().decryption_network, DATIL);
        assert_eq!(registry.get(11155420).unwrap().decryption_network, DATIL_TEST);
    }

    #[test]
    fn unknown_chain_is_rejected() {
        let registry = ChainRegistry::builtin();
        assert!(matches!(
            registry.get(1),
            Err(ResolverError::UnsupportedChain(1))
        ));
    }

    #[test]
    fn registry_addresses_parse() {
        for id in ChainRegistry::builtin().chain_ids() {
            let chain = ChainRegistry::builtin().get(id).unwrap().clone();
            assert!(chain.attester.parse::<alloy::primitives::Address>().is_ok());
            assert!(chain
                .permission_manager
                .parse::<alloy::primitives::Address>()
                .is_ok());
            assert_eq!(chain.schema_id.len(), 66);
        }
    }

    #[test]
    fn from_lookup_reads_all_settings() {
        let config = ResolverConfig::from_lookup(lookup_from(&[
            (CHAIN_ID_ENV, "84532"),
            (APP_PRIVATE_KEY_ENV, " 0xabc "),
            (RPC_URL_ENV, "http://localhost:8545"),
            (HTTP_TIMEOUT_ENV, "3"),
        ]))
        .unwrap();

        assert_eq!(config.chain_id, Some(84532));
        assert_eq!(config.app_private_key.as_deref(), Some("0xabc"));
        assert_eq!(config.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(config.indexer_url, None);
        assert_eq!(config.http_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn from_lookup_rejects_bad_chain_id() {
        let result = ResolverConfig::from_lookup(lookup_from(&[(CHAIN_ID_ENV, "sepolia")]));
        assert!(matches!(result, Err(ResolverError::Configuration(_))));
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let config =
            ResolverConfig::from_lookup(lookup_from(&[(APP_PRIVATE_KEY_ENV, "   ")])).unwrap();
        assert!(config.app_private_key.is_none());
        assert!(config.chain_id.is_none());
        assert_eq!(config.http_timeout(), DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn private_key_is_loaded_from_pem_file() {
        use k256::pkcs8::{EncodePrivateKey, LineEnding};

        const KEY: &str = "0x1c1bca6747c0673525739b2318bef79eed53542c2928edfdbd30ff8bc2626192";
        let secret = k256::SecretKey::from_slice(&alloy::hex::decode(KEY).unwrap()).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.pem");
        fs::write(&path, secret.to_pkcs8_pem(LineEnding::LF).unwrap().as_bytes()).unwrap();

        let path = path.to_string_lossy().to_string();
        let config = ResolverConfig::from_lookup(lookup_from(&[
            (CHAIN_ID_ENV, "84532"),
            (APP_PRIVATE_KEY_PATH_ENV, path.as_str()),
        ]))
        .unwrap();
        assert_eq!(config.app_private_key.as_deref(), Some(KEY));

        let missing = ResolverConfig::from_lookup(lookup_from(&[(
            APP_PRIVATE_KEY_PATH_ENV,
            "/nonexistent/app.pem",
        )]));
        assert!(matches!(missing, Err(ResolverError::Configuration(_))));
    }

    #[test]
    fn debug_output_redacts_private_key() {
        let config = ResolverConfig::new(84532).with_app_private_key("0xdeadbeef");
        let printed = format!("{config:?}");
        assert!(!printed.contains("deadbeef"));
        assert!(printed.contains("<redacted>"));
    }
}
