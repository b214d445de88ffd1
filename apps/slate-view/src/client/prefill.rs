//! Compact text form of a row's values, handed to the injection form so an
//! operator can resend a captured message.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde_json::Value as Json;
use sniffer_sdk::Row;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrefillError {
    #[error("prefill is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("prefill is not a JSON array: {0}")]
    Json(#[from] serde_json::Error),
}

/// Base64 of the JSON array of the row's values. The id is not included.
pub fn encode_row(row: &Row) -> String {
    let values: Vec<Json> = row.values.iter().map(|v| v.to_json()).collect();
    encode_values(&values)
}

pub fn encode_values(values: &[Json]) -> String {
    // Serializing a slice of JSON values cannot fail.
    let json = serde_json::to_vec(values).unwrap_or_default();
    BASE64_STANDARD.encode(json)
}

pub fn decode(text: &str) -> Result<Vec<Json>, PrefillError> {
    let bytes = BASE64_STANDARD.decode(text.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}
