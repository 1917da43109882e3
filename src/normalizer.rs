//! Canonical Base64 encoding for every capture artifact shape.
//!
//! Whatever the transport produced (a data URL, a credential record, a
//! synthesized JSON payload, raw bytes), the normalizer reduces it to a single
//! Base64 string with no scheme prefix. Normalizing an already-normalized
//! string returns it unchanged.

use crate::error::CaptureError;
use crate::types::CaptureArtifact;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD as BASE64};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = "base64,";

/// Standard alphabet, padding optional; only for payloads declared as Base64
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Converts raw capture artifacts into the canonical Base64 payload
pub struct EncodingNormalizer;

impl EncodingNormalizer {
    /// Normalize any supported artifact
    pub fn normalize(artifact: &CaptureArtifact) -> Result<String, CaptureError> {
        trace!("Normalizing {} artifact", artifact.kind());
        match artifact {
            CaptureArtifact::Text(text) => Ok(Self::normalize_text(text)),
            CaptureArtifact::Binary(bytes) => Ok(BASE64.encode(bytes)),
            CaptureArtifact::Structured(value) => Self::encode_json(value),
            CaptureArtifact::Credential(credential) => Self::encode_json(&credential.to_json_value()),
        }
    }

    /// Normalize a string artifact. Total: every string maps to valid Base64.
    pub fn normalize_text(text: &str) -> String {
        if has_data_url_scheme(text) {
            if let Some((header, payload)) = text.split_once(',') {
                if header.to_ascii_lowercase().ends_with(";base64") {
                    return Self::repad_base64(payload);
                }
                return Self::ensure_base64(payload);
            }
        } else if let Some(index) = text.find(BASE64_MARKER) {
            return Self::repad_base64(&text[index + BASE64_MARKER.len()..]);
        }

        Self::ensure_base64(text)
    }

    /// Serialize any structured value to canonical JSON, then Base64 it
    pub fn normalize_serializable<T: Serialize + ?Sized>(value: &T) -> Result<String, CaptureError> {
        let value = serde_json::to_value(value).map_err(|e| {
            CaptureError::encoding_failure(format!("Artifact is not serializable: {}", e))
        })?;
        Self::encode_json(&value)
    }

    fn encode_json(value: &Value) -> Result<String, CaptureError> {
        let mut out = String::new();
        write_canonical_json(value, &mut out)?;
        Ok(BASE64.encode(out.as_bytes()))
    }

    fn ensure_base64(text: &str) -> String {
        if is_valid_base64(text) {
            text.to_string()
        } else {
            BASE64.encode(text.as_bytes())
        }
    }

    /// Declared Base64 payloads may omit padding; emit the padded form
    fn repad_base64(payload: &str) -> String {
        if is_valid_base64(payload) {
            return payload.to_string();
        }
        match LENIENT_BASE64.decode(payload) {
            Ok(bytes) => BASE64.encode(bytes),
            Err(_) => BASE64.encode(payload.as_bytes()),
        }
    }
}

/// Shorthand for [`EncodingNormalizer::normalize`]
pub fn normalize(artifact: &CaptureArtifact) -> Result<String, CaptureError> {
    EncodingNormalizer::normalize(artifact)
}

/// Strict check against the standard padded alphabet
pub fn is_valid_base64(text: &str) -> bool {
    BASE64.decode(text).is_ok()
}

fn has_data_url_scheme(text: &str) -> bool {
    text.get(..DATA_URL_SCHEME.len())
        .map(|prefix| prefix.eq_ignore_ascii_case(DATA_URL_SCHEME))
        .unwrap_or(false)
}

/// JSON text with object keys sorted and no insignificant whitespace
fn write_canonical_json(value: &Value, out: &mut String) -> Result<(), CaptureError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&to_json_text(&Value::String((*key).clone()))?);
                out.push(':');
                write_canonical_json(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&to_json_text(scalar)?),
    }
    Ok(())
}

fn to_json_text(value: &Value) -> Result<String, CaptureError> {
    serde_json::to_string(value)
        .map_err(|e| CaptureError::encoding_failure(format!("JSON serialization failed: {}", e)))
}
