// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Attestation Indexer
//!
//! Client for the EAS GraphQL indexer.
//!
//! ## Query contract
//!
//! Both lookups filter on attester, schema id and `revocationTime == 0`, and
//! select records whose `decodedDataJson` *contains* a needle string (the
//! hashed lookup key, or a recipient address). Containment is the indexer's
//! predicate because the decoded layout differs between schema versions; it
//! must not be narrowed to structured equality. The same predicate is
//! re-applied client-side through [`AttestationIndex::contains_substring`].

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ChainConfig;
use crate::error::{ResolverError, Result};

const GENERIC_FAILURE: &str = "Failed to fetch data";

const FIND_FIRST_QUERY: &str = r#"
query FindFirstAttestation(
  $attester: String!
  $schemaId: String!
  $needle: String!
) {
  findFirstAttestation(
    where: {
      attester: { equals: $attester }
      schemaId: { equals: $schemaId }
      revocationTime: { equals: 0 }
      decodedDataJson: { contains: $needle }
    }
  ) {
    id
    decodedDataJson
    data
    revocationTime
  }
}"#;

const FIND_ALL_QUERY: &str = r#"
query GetAttestations(
  $attester: String!
  $schemaId: String!
  $needle: String!
) {
  attestations(
    where: {
      attester: { equals: $attester }
      schemaId: { equals: $schemaId }
      revocationTime: { equals: 0 }
      decodedDataJson: { contains: $needle }
    }
  ) {
    id
    decodedDataJson
    data
    revocationTime
  }
}"#;

/// Attestation as returned by the indexer. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub id: String,
    pub decoded_data_json: String,
    /// ABI-encoded payload, `0x`-prefixed hex.
    pub data: String,
    #[serde(default)]
    pub revocation_time: u64,
}

impl Attestation {
    pub fn is_revoked(&self) -> bool {
        self.revocation_time != 0
    }
}

/// Read access to live attestations of the configured attester and schema.
pub trait AttestationIndex {
    /// At most one live attestation whose decoded data contains `needle`.
    fn find_first(&self, needle: &str) -> impl Future<Output = Result<Option<Attestation>>> + Send;

    /// Every live attestation whose decoded data contains `needle`, in indexer order.
    fn find_all(&self, needle: &str) -> impl Future<Output = Result<Vec<Attestation>>> + Send;

    /// The match predicate of both queries: plain, case-sensitive substring
    /// containment over the serialized `decodedDataJson`.
    fn contains_substring(&self, haystack: &str, needle: &str) -> bool {
        haystack.contains(needle)
    }

    /// Whether a returned record satisfies the query contract.
    fn is_match(&self, attestation: &Attestation, needle: &str) -> bool {
        !attestation.is_revoked() && self.contains_substring(&attestation.decoded_data_json, needle)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindFirstData {
    find_first_attestation: Option<Attestation>,
}

#[derive(Debug, Deserialize)]
struct FindAllData {
    #[serde(default)]
    attestations: Vec<Attestation>,
}

/// GraphQL client bound to one indexer endpoint, attester and schema.
#[derive(Debug, Clone)]
pub struct EasIndexerClient {
    endpoint: String,
    attester: String,
    schema_id: String,
    http: Client,
}

impl EasIndexerClient {
    pub fn new(
        endpoint: impl Into<String>,
        attester: impl Into<String>,
        schema_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolverError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            attester: attester.into(),
            schema_id: schema_id.into(),
            http,
        })
    }

    /// Client for a registry chain, optionally pointed at another endpoint.
    pub fn for_chain(chain: &ChainConfig, endpoint: Option<&str>, timeout: Duration) -> Result<Self> {
        Self::new(
            endpoint.unwrap_or(chain.graphql_endpoint),
            chain.attester,
            chain.schema_id,
            timeout,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `{query, variables}` and return the `data` object.
    pub async fn query(&self, document: &str, variables: Value) -> Result<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&json!({ "query": document, "variables": variables }))
            .send()
            .await
            .map_err(|e| ResolverError::IndexerRequest(format!("POST {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ResolverError::IndexerRequest(format!("reading response from {} failed: {e}", self.endpoint))
        })?;

        let envelope = serde_json::from_str::<GraphQlEnvelope>(&body).ok();

        if !status.is_success() {
            let message = envelope
                .and_then(|env| env.errors.into_iter().next())
                .map(|err| err.message)
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            tracing::warn!(endpoint = %self.endpoint, %status, %message, "Indexer request rejected");
            return Err(ResolverError::IndexerRequest(message));
        }

        let envelope = envelope.ok_or_else(|| {
            ResolverError::IndexerRequest(format!("invalid JSON from {}", self.endpoint))
        })?;

        match envelope.data {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(ResolverError::IndexerRequest(
                envelope
                    .errors
                    .into_iter()
                    .next()
                    .map(|err| err.message)
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            )),
        }
    }

    fn variables(&self, needle: &str) -> Value {
        json!({
            "attester": self.attester,
            "schemaId": self.schema_id,
            "needle": needle,
        })
    }
}

impl AttestationIndex for EasIndexerClient {
    async fn find_first(&self, needle: &str) -> Result<Option<Attestation>> {
        let data = self.query(FIND_FIRST_QUERY, self.variables(needle)).await?;
        let parsed: FindFirstData = serde_json::from_value(data)
            .map_err(|e| ResolverError::IndexerRequest(format!("unexpected findFirst shape: {e}")))?;

        let found = parsed
            .find_first_attestation
            .filter(|attestation| self.is_match(attestation, needle));

        tracing::debug!(found = found.is_some(), "findFirstAttestation");
        Ok(found)
    }

    async fn find_all(&self, needle: &str) -> Result<Vec<Attestation>> {
        let data = self.query(FIND_ALL_QUERY, self.variables(needle)).await?;
        let parsed: FindAllData = serde_json::from_value(data)
            .map_err(|e| ResolverError::IndexerRequest(format!("unexpected attestations shape: {e}")))?;

        let total = parsed.attestations.len();
        let live: Vec<Attestation> = parsed
            .attestations
            .into_iter()
            .filter(|attestation| self.is_match(attestation, needle))
            .collect();

        if live.len() != total {
            tracing::warn!(
                returned = total,
                kept = live.len(),
                "Indexer returned records outside the query contract"
            );
        }

        Ok(live)
    }
}
