// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire transport to the decryption network gateway.
//!
//! The gateway is operated alongside the deployment (`OCI_DECRYPTION_URL`);
//! it fans requests out to the node set and combines the decryption shares.
//! No public endpoint serves this protocol, so none is built in. The
//! transport only performs the two calls a session needs:
//!
//! | Call        | Route                    | Response                  |
//! |-------------|--------------------------|---------------------------|
//! | handshake   | `POST /web/handshake`    | `{ "latestBlockhash" }`   |
//! | decrypt     | `POST /web/decrypt`      | `{ "decryptedData" }` (base64) |

use std::future::Future;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::auth::SessionSigs;
use super::CiphertextEnvelope;
use crate::error::{ResolverError, Result};

/// Result of a handshake with the network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Chain-head reference used as the SIWE nonce.
    pub latest_blockhash: String,
    #[serde(default)]
    pub network_public_key: Option<String>,
}

/// Body of a decrypt call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    #[serde(flatten)]
    pub envelope: CiphertextEnvelope,
    pub session_sigs: SessionSigs,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptResponse {
    decrypted_data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "errorCode")]
    error_code: Option<String>,
}

/// Calls against a decryption network endpoint.
///
/// Handshake failures are [`ResolverError::Connection`]; decrypt failures are
/// [`ResolverError::Decryption`].
pub trait DecryptionTransport {
    fn handshake(&self, endpoint: &str) -> impl Future<Output = Result<Handshake>> + Send;

    fn decrypt(
        &self,
        endpoint: &str,
        request: &DecryptRequest,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// HTTP transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpDecryptionTransport {
    http: Client,
}

impl HttpDecryptionTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolverError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

fn route(endpoint: &str, path: &str) -> String {
    format!("{}{path}", endpoint.trim_end_matches('/'))
}

fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            error_code,
        }) => match error_code {
            Some(code) => format!("{status}: {message} ({code})"),
            None => format!("{status}: {message}"),
        },
        _ if body.is_empty() => status.to_string(),
        _ => format!("{status}: {body}"),
    }
}

impl DecryptionTransport for HttpDecryptionTransport {
    async fn handshake(&self, endpoint: &str) -> Result<Handshake> {
        let url = route(endpoint, "/web/handshake");
        let challenge: [u8; 32] = rand::random();

        let response = self
            .http
            .post(&url)
            .json(&json!({ "challenge": alloy::hex::encode(challenge) }))
            .send()
            .await
            .map_err(|e| ResolverError::Connection(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ResolverError::Connection(format!("reading handshake from {url} failed: {e}")))?;

        if !status.is_success() {
            return Err(ResolverError::Connection(describe_failure(status, &body)));
        }

        let handshake: Handshake = serde_json::from_str(&body)
            .map_err(|e| ResolverError::Connection(format!("invalid handshake response: {e}")))?;
        if handshake.latest_blockhash.is_empty() {
            return Err(ResolverError::Connection(
                "handshake response has no latest blockhash".to_string(),
            ));
        }
        Ok(handshake)
    }

    async fn decrypt(&self, endpoint: &str, request: &DecryptRequest) -> Result<Vec<u8>> {
        let url = route(endpoint, "/web/decrypt");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ResolverError::Decryption(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ResolverError::Decryption(format!("reading response from {url} failed: {e}")))?;

        if !status.is_success() {
            return Err(ResolverError::Decryption(describe_failure(status, &body)));
        }

        let parsed: DecryptResponse = serde_json::from_str(&body)
            .map_err(|e| ResolverError::Decryption(format!("invalid decrypt response: {e}")))?;
        Base64::decode_vec(&parsed.decrypted_data)
            .map_err(|e| ResolverError::Decryption(format!("decrypted data is not base64: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn transport() -> HttpDecryptionTransport {
        HttpDecryptionTransport::new(Duration::from_secs(5)).unwrap()
    }

    fn request() -> DecryptRequest {
        DecryptRequest {
            envelope: serde_json::from_value(json!({
                "ciphertext": "abc",
                "dataToEncryptHash": "def",
                "unifiedAccessControlConditions": [],
                "chain": "baseSepolia"
            }))
            .unwrap(),
            session_sigs: SessionSigs::new(),
        }
    }

    #[tokio::test]
    async fn handshake_returns_latest_blockhash() {
        let app = Router::new().route(
            "/web/handshake",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["challenge"].as_str().unwrap().len(), 64);
                Json(json!({"latestBlockhash": "0xfeed"}))
            }),
        );
        let endpoint = spawn(app).await;

        let handshake = transport().handshake(&format!("{endpoint}/")).await.unwrap();
        assert_eq!(handshake.latest_blockhash, "0xfeed");
        assert_eq!(handshake.network_public_key, None);
    }

    #[tokio::test]
    async fn handshake_failure_is_a_connection_error() {
        let app = Router::new().route(
            "/web/handshake",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"message": "syncing"}))) }),
        );
        let endpoint = spawn(app).await;

        let err = transport().handshake(&endpoint).await.unwrap_err();
        assert!(matches!(&err, ResolverError::Connection(msg) if msg.contains("syncing")));

        let err = transport().handshake("http://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, ResolverError::Connection(_)));
    }

    #[tokio::test]
    async fn decrypt_posts_envelope_and_decodes_plaintext() {
        let app = Router::new().route(
            "/web/decrypt",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["ciphertext"], "abc");
                assert_eq!(body["dataToEncryptHash"], "def");
                assert_eq!(body["chain"], "baseSepolia");
                assert!(body["sessionSigs"].is_object());
                Json(json!({"decryptedData": Base64::encode_string(b"{\"id\":\"1\"}")}))
            }),
        );
        let endpoint = spawn(app).await;

        let plaintext = transport().decrypt(&endpoint, &request()).await.unwrap();
        assert_eq!(plaintext, b"{\"id\":\"1\"}");
    }

    #[tokio::test]
    async fn decrypt_rejection_is_a_decryption_error() {
        let app = Router::new().route(
            "/web/decrypt",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"message": "access denied", "errorCode": "NodeAccessControlConditionsReturnedNotAuthorized"})),
                )
            }),
        );
        let endpoint = spawn(app).await;

        let err = transport().decrypt(&endpoint, &request()).await.unwrap_err();
        assert!(matches!(&err, ResolverError::Decryption(msg) if msg.contains("access denied")));
    }
}
