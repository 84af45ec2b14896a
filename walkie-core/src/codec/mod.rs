//! Single-token encoding of a negotiation payload for out-of-band pairing.
//!
//! A token is `wt://` followed by the URL-safe base64 of the zlib-compressed
//! JSON form `{"v":1,"t":"offer"|"answer","s":{...}}`. It can be printed,
//! put in a QR code or pasted into a chat without further escaping.

use crate::model::SessionDescription;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

pub const SCHEME_PREFIX: &str = "wt://";
pub const PAYLOAD_VERSION: u8 = 1;

/// Upper bound on the decompressed JSON; a session description is a few KiB.
const MAX_DECODED_BYTES: u64 = 64 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid or corrupted payload: {0}")]
    CorruptPayload(String),
    #[error("unsupported payload: {0}")]
    UnsupportedPayload(String),
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualPayload {
    #[serde(rename = "v")]
    pub version: u8,
    #[serde(rename = "t")]
    pub kind: PayloadKind,
    #[serde(rename = "s")]
    pub description: SessionDescription,
}

impl ManualPayload {
    pub fn offer(description: SessionDescription) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            kind: PayloadKind::Offer,
            description,
        }
    }

    pub fn answer(description: SessionDescription) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            kind: PayloadKind::Answer,
            description,
        }
    }

    pub fn encode(&self) -> Result<String, CodecError> {
        let json = serde_json::to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(&json)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        let compressed = encoder
            .finish()
            .map_err(|e| CodecError::Encode(e.to_string()))?;

        Ok(format!("{SCHEME_PREFIX}{}", URL_SAFE_NO_PAD.encode(compressed)))
    }

    /// Inverse of [`ManualPayload::encode`]. The scheme prefix is optional.
    pub fn decode(token: &str) -> Result<Self, CodecError> {
        let trimmed = token.trim();
        let body = trimmed.strip_prefix(SCHEME_PREFIX).unwrap_or(trimmed);
        if body.is_empty() {
            return Err(CodecError::CorruptPayload("empty token".to_string()));
        }

        let compressed = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| CodecError::CorruptPayload(format!("bad encoding: {e}")))?;

        let mut json = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .take(MAX_DECODED_BYTES + 1)
            .read_to_end(&mut json)
            .map_err(|e| CodecError::CorruptPayload(format!("bad compression: {e}")))?;

        if json.is_empty() {
            return Err(CodecError::CorruptPayload("no data".to_string()));
        }
        if json.len() as u64 > MAX_DECODED_BYTES {
            return Err(CodecError::CorruptPayload("payload too large".to_string()));
        }

        let value: serde_json::Value = serde_json::from_slice(&json)
            .map_err(|e| CodecError::CorruptPayload(format!("bad json: {e}")))?;

        Self::validate(value)
    }

    fn validate(value: serde_json::Value) -> Result<Self, CodecError> {
        let version = value.get("v").and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(PAYLOAD_VERSION)) {
            return Err(CodecError::UnsupportedPayload(format!(
                "version {:?}",
                value.get("v")
            )));
        }

        let kind = match value.get("t").and_then(serde_json::Value::as_str) {
            Some("offer") => PayloadKind::Offer,
            Some("answer") => PayloadKind::Answer,
            other => {
                return Err(CodecError::UnsupportedPayload(format!("type {other:?}")));
            }
        };

        let description = value
            .get("s")
            .cloned()
            .ok_or_else(|| CodecError::UnsupportedPayload("missing description".to_string()))
            .and_then(|s| {
                serde_json::from_value::<SessionDescription>(s)
                    .map_err(|e| CodecError::UnsupportedPayload(format!("description: {e}")))
            })?;

        Ok(Self {
            version: PAYLOAD_VERSION,
            kind,
            description,
        })
    }
}
