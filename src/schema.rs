// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Attestation schema codec.
//!
//! Attestation payloads are ABI parameter encodings of a fixed, ordered
//! tuple described by a schema string such as
//! `bytes32 key, string provider, string secret, string metadata`. The
//! codec is bound to one schema string at construction; decoding a payload
//! written under a different schema fails instead of misaligning fields.

use std::str::FromStr;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResolverError, Result};

/// One `(type, name)` entry of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub type_name: String,
    ty: DynSolType,
}

/// Decoded value, shaped like the indexer's `decodedDataJson` items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedValue {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: DecodedValue,
}

impl DecodedField {
    pub fn as_str(&self) -> Option<&str> {
        self.value.value.as_str()
    }
}

/// Schema-driven encoder/decoder for attestation data.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaCodec {
    schema: String,
    fields: Vec<SchemaField>,
}

impl SchemaCodec {
    /// Parse a schema string. Fails on unknown types or malformed entries.
    pub fn new(schema: &str) -> Result<Self> {
        let mut fields = Vec::new();

        for entry in schema.split(',') {
            let parts: Vec<&str> = entry.split_whitespace().collect();
            let [type_name, name] = parts.as_slice() else {
                return Err(ResolverError::Configuration(format!(
                    "invalid schema entry `{}` in `{schema}`",
                    entry.trim()
                )));
            };

            let ty = DynSolType::parse(type_name).map_err(|e| {
                ResolverError::Configuration(format!("invalid schema type `{type_name}`: {e}"))
            })?;

            fields.push(SchemaField {
                name: name.to_string(),
                type_name: ty.sol_type_name().into_owned(),
                ty,
            });
        }

        Ok(Self {
            schema: schema.to_string(),
            fields,
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    fn tuple_type(&self) -> DynSolType {
        DynSolType::Tuple(self.fields.iter().map(|f| f.ty.clone()).collect())
    }

    /// Decode a `0x`-prefixed hex payload as returned by the indexer.
    pub fn decode_hex(&self, raw: &str) -> Result<Vec<DecodedField>> {
        let bytes = alloy::hex::decode(raw.trim())
            .map_err(|e| ResolverError::SchemaMismatch(format!("payload is not valid hex: {e}")))?;
        self.decode(&bytes)
    }

    /// Decode a raw payload into named fields in schema order.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<DecodedField>> {
        let decoded = self.tuple_type().abi_decode_params(data).map_err(|e| {
            ResolverError::SchemaMismatch(format!("payload does not match `{}`: {e}", self.schema))
        })?;

        // A payload with extra trailing fields still decodes, so insist on a
        // byte-identical re-encoding.
        if decoded.abi_encode_params() != data {
            return Err(ResolverError::SchemaMismatch(format!(
                "payload length or layout disagrees with `{}`",
                self.schema
            )));
        }

        let values = match decoded {
            DynSolValue::Tuple(values) => values,
            other => vec![other],
        };

        if values.len() != self.fields.len() {
            return Err(ResolverError::SchemaMismatch(format!(
                "expected {} fields, decoded {}",
                self.fields.len(),
                values.len()
            )));
        }

        self.fields
            .iter()
            .zip(values)
            .map(|(field, value)| {
                Ok(DecodedField {
                    name: field.name.clone(),
                    type_name: field.type_name.clone(),
                    value: DecodedValue {
                        name: field.name.clone(),
                        type_name: field.type_name.clone(),
                        value: value_to_json(&value)?,
                    },
                })
            })
            .collect()
    }

    /// Encode named values (in schema order) into a payload.
    pub fn encode(&self, values: &[(&str, Value)]) -> Result<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(ResolverError::SchemaMismatch(format!(
                "expected {} fields, got {}",
                self.fields.len(),
                values.len()
            )));
        }

        let mut encoded = Vec::with_capacity(values.len());
        for (field, (name, value)) in self.fields.iter().zip(values) {
            if field.name != *name {
                return Err(ResolverError::SchemaMismatch(format!(
                    "expected field `{}`, got `{name}`",
                    field.name
                )));
            }
            encoded.push(json_to_value(&field.ty, value)?);
        }

        Ok(DynSolValue::Tuple(encoded).abi_encode_params())
    }

    /// Decode indexer `decodedDataJson` without touching the raw payload.
    pub fn parse_decoded_json(raw: &str) -> Result<Vec<DecodedField>> {
        serde_json::from_str(raw)
            .map_err(|e| ResolverError::SchemaMismatch(format!("invalid decodedDataJson: {e}")))
    }
}

/// First field with the given name.
pub fn extract<'a>(fields: &'a [DecodedField], name: &str) -> Option<&'a DecodedField> {
    fields.iter().find(|field| field.name == name)
}

/// String value of the first field with the given name. Empty strings count as absent.
pub fn extract_str<'a>(fields: &'a [DecodedField], name: &str) -> Option<&'a str> {
    extract(fields, name)
        .and_then(DecodedField::as_str)
        .filter(|value| !value.is_empty())
}

fn value_to_json(value: &DynSolValue) -> Result<Value> {
    let json = match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(alloy::hex::encode_prefixed(&word[..*size]))
        }
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Bytes(bytes) => Value::String(alloy::hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(value_to_json).collect::<Result<_>>()?)
        }
        other => {
            return Err(ResolverError::SchemaMismatch(format!(
                "unsupported decoded value {other:?}"
            )))
        }
    };
    Ok(json)
}

fn json_to_value(ty: &DynSolType, value: &Value) -> Result<DynSolValue> {
    let mismatch = || ResolverError::SchemaMismatch(format!("value {value} is not a valid {ty}"));

    let encoded = match ty {
        DynSolType::Bool => DynSolValue::Bool(value.as_bool().ok_or_else(mismatch)?),
        DynSolType::String => DynSolValue::String(value.as_str().ok_or_else(mismatch)?.to_string()),
        DynSolType::Address => {
            let raw = value.as_str().ok_or_else(mismatch)?;
            DynSolValue::Address(Address::from_str(raw).map_err(|_| mismatch())?)
        }
        DynSolType::FixedBytes(size) => {
            let bytes = alloy::hex::decode(value.as_str().ok_or_else(mismatch)?)
                .map_err(|_| mismatch())?;
            if bytes.len() != *size {
                return Err(mismatch());
            }
            DynSolValue::FixedBytes(B256::right_padding_from(&bytes), *size)
        }
        DynSolType::Bytes => {
            let bytes = alloy::hex::decode(value.as_str().ok_or_else(mismatch)?)
                .map_err(|_| mismatch())?;
            DynSolValue::Bytes(bytes)
        }
        DynSolType::Uint(bits) => {
            let parsed = match value {
                Value::String(s) => U256::from_str(s).map_err(|_| mismatch())?,
                Value::Number(n) => U256::from(n.as_u64().ok_or_else(mismatch)?),
                _ => return Err(mismatch()),
            };
            DynSolValue::Uint(parsed, *bits)
        }
        DynSolType::Int(bits) => {
            let parsed = match value {
                Value::String(s) => I256::from_str(s).map_err(|_| mismatch())?,
                Value::Number(n) => I256::try_from(n.as_i64().ok_or_else(mismatch)?)
                    .map_err(|_| mismatch())?,
                _ => return Err(mismatch()),
            };
            DynSolValue::Int(parsed, *bits)
        }
        _ => {
            return Err(ResolverError::SchemaMismatch(format!(
                "encoding `{ty}` values is not supported"
            )))
        }
    };
    Ok(encoded)
}
