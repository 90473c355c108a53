// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OID permission manager: read-only access checks.

use std::future::Future;
use std::str::FromStr;

use alloy::{
    primitives::{Address, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    sol,
};

use crate::config::ChainConfig;
use crate::error::{ResolverError, Result};

sol! {
    #[sol(rpc)]
    interface IOidPermissionManager {
        function hasPermission(bytes32 uid, address account) external view returns (bool);
    }
}

/// Answers whether an account may access an attestation key.
///
/// `Ok(false)` means denied. `Err` means the answer is unknown and must not
/// be treated as a denial.
pub trait PermissionOracle {
    fn has_permission(
        &self,
        key: B256,
        account: Address,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Permission manager contract on one chain.
pub struct OidPermissionManager {
    contract: IOidPermissionManager::IOidPermissionManagerInstance<DynProvider>,
    address: Address,
    chain_id: u64,
}

impl OidPermissionManager {
    /// Connect to the chain's permission manager, optionally overriding the RPC URL.
    pub fn new(chain: &ChainConfig, rpc_url: Option<&str>) -> Result<Self> {
        let address = Address::from_str(chain.permission_manager).map_err(|e| {
            ResolverError::Configuration(format!(
                "invalid permission manager address for chain {}: {e}",
                chain.chain_id
            ))
        })?;

        let rpc_url = rpc_url.unwrap_or(chain.rpc_url);
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| ResolverError::Configuration(format!("Invalid RPC URL {rpc_url}: {e}")))?;

        let provider = ProviderBuilder::new().connect_http(url).erased();
        let contract = IOidPermissionManager::new(address, provider);

        Ok(Self {
            contract,
            address,
            chain_id: chain.chain_id,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

impl PermissionOracle for OidPermissionManager {
    async fn has_permission(&self, key: B256, account: Address) -> Result<bool> {
        let granted = self
            .contract
            .hasPermission(key, account)
            .call()
            .await
            .map_err(|e| ResolverError::PermissionCheck {
                key: alloy::hex::encode_prefixed(key),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            chain_id = self.chain_id,
            key = %key,
            account = %account,
            granted,
            "Permission checked"
        );

        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainRegistry, BASE_SEPOLIA};
    use alloy::sol_types::SolCall;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Minimal JSON-RPC endpoint answering `eth_call` with `result`.
    async fn spawn_rpc(result: Option<&'static str>) -> String {
        let app = Router::new().route(
            "/",
            post(move |Json(request): Json<Value>| async move {
                let id = request.get("id").cloned().unwrap_or(json!(1));
                let method = request.get("method").and_then(Value::as_str).unwrap_or("");
                let body = match (method, result) {
                    ("eth_call", Some(result)) => {
                        json!({"jsonrpc": "2.0", "id": id, "result": result})
                    }
                    ("eth_call", None) => json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32000, "message": "execution reverted"}
                    }),
                    ("eth_chainId", _) => json!({"jsonrpc": "2.0", "id": id, "result": "0x14a34"}),
                    _ => json!({"jsonrpc": "2.0", "id": id, "result": "0x0"}),
                };
                Json(body)
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    const TRUE_WORD: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const FALSE_WORD: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

    #[test]
    fn selector_matches_contract_abi() {
        // bytes4(keccak256("hasPermission(bytes32,address)"))
        let hash = alloy::primitives::keccak256("hasPermission(bytes32,address)");
        assert_eq!(IOidPermissionManager::hasPermissionCall::SELECTOR[..], hash[..4]);
    }

    #[test]
    fn builds_for_every_builtin_chain() {
        let registry = ChainRegistry::builtin();
        for id in registry.chain_ids() {
            let manager = OidPermissionManager::new(registry.get(id).unwrap(), None).unwrap();
            assert_eq!(manager.chain_id(), id);
        }
    }

    #[test]
    fn rejects_invalid_rpc_url() {
        let result = OidPermissionManager::new(&BASE_SEPOLIA, Some("not a url"));
        assert!(matches!(result, Err(ResolverError::Configuration(_))));
    }

    #[tokio::test]
    async fn granted_and_denied_are_distinguished() {
        let account = Address::repeat_byte(0x11);

        let url = spawn_rpc(Some(TRUE_WORD)).await;
        let manager = OidPermissionManager::new(&BASE_SEPOLIA, Some(&url)).unwrap();
        assert!(manager.has_permission(B256::repeat_byte(1), account).await.unwrap());

        let url = spawn_rpc(Some(FALSE_WORD)).await;
        let manager = OidPermissionManager::new(&BASE_SEPOLIA, Some(&url)).unwrap();
        assert!(!manager.has_permission(B256::repeat_byte(1), account).await.unwrap());
    }

    #[tokio::test]
    async fn rpc_failure_is_an_error_not_a_denial() {
        let url = spawn_rpc(None).await;
        let manager = OidPermissionManager::new(&BASE_SEPOLIA, Some(&url)).unwrap();
        let result = manager
            .has_permission(B256::repeat_byte(2), Address::repeat_byte(0x22))
            .await;
        assert!(matches!(result, Err(ResolverError::PermissionCheck { .. })));
    }

    #[tokio::test]
    async fn unreachable_rpc_is_an_error() {
        let manager =
            OidPermissionManager::new(&BASE_SEPOLIA, Some("http://127.0.0.1:1")).unwrap();
        let result = manager.has_permission(B256::ZERO, Address::ZERO).await;
        assert!(matches!(result, Err(ResolverError::PermissionCheck { .. })));
    }
}
