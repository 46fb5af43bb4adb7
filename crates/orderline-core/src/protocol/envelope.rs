//! Envelope and payload (JSON).
//!
//! The payload stores `data` as `RawValue` so filters that only need the
//! header never pay for decoding the body.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{OrderlineError, Result};
use crate::protocol::config::ConfigurationEnvelope;

/// Client-submitted transaction. Immutable once received; cloning is cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Encoded `Payload` bytes.
    pub payload: Bytes,
    /// Signature over `payload`. Verified outside the ordering core.
    pub signature: Bytes,
}

impl Envelope {
    pub fn new(payload: impl Into<Bytes>, signature: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            signature: signature.into(),
        }
    }

    /// True when the envelope carries no payload at all.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Size accounted against batch byte limits.
    pub fn size(&self) -> usize {
        self.payload.len() + self.signature.len()
    }

    /// Decode the payload document.
    pub fn decode_payload(&self) -> Result<Payload> {
        if self.payload.is_empty() {
            return Err(OrderlineError::BadRequest("empty payload".into()));
        }
        let payload: Payload = serde_json::from_slice(&self.payload).map_err(|e| {
            tracing::debug!(error = %e, "payload decode failed");
            OrderlineError::BadRequest(format!("invalid payload json: {e}"))
        })?;
        if payload.header.chain_id.is_empty() {
            return Err(OrderlineError::BadRequest("missing chain_id".into()));
        }
        Ok(payload)
    }
}

/// Decoded envelope payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    pub header: Header,
    /// Transaction body, stored as raw JSON (lazy parsing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,
}

/// Payload header: routing and classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Header {
    /// Target chain identifier.
    pub chain_id: String,
    /// Transaction type (field name is `type` in JSON).
    #[serde(rename = "type", default)]
    pub kind: HeaderType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderType {
    #[default]
    Message,
    ConfigurationTransaction,
}

impl Payload {
    /// Build a regular transaction payload for `chain_id`.
    pub fn message<T: Serialize>(chain_id: impl Into<String>, data: &T) -> Result<Self> {
        Ok(Self {
            header: Header {
                chain_id: chain_id.into(),
                kind: HeaderType::Message,
            },
            data: Some(to_raw(data)?),
        })
    }

    /// Build a configuration transaction payload. The header chain is taken
    /// from the configuration itself.
    pub fn configuration(config: &ConfigurationEnvelope) -> Result<Self> {
        Ok(Self {
            header: Header {
                chain_id: config.chain_id.clone(),
                kind: HeaderType::ConfigurationTransaction,
            },
            data: Some(to_raw(config)?),
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    pub fn is_config(&self) -> bool {
        self.header.kind == HeaderType::ConfigurationTransaction
    }

    /// Decode `data` as a configuration transaction body.
    pub fn decode_config(&self) -> Result<ConfigurationEnvelope> {
        if !self.is_config() {
            return Err(OrderlineError::BadRequest(
                "not a configuration transaction".into(),
            ));
        }
        let raw = self.data.as_ref().ok_or_else(|| {
            OrderlineError::BadRequest("configuration transaction requires data".into())
        })?;
        serde_json::from_str(raw.get())
            .map_err(|e| OrderlineError::BadRequest(format!("invalid configuration data: {e}")))
    }

    /// Encode into an unsigned envelope.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| OrderlineError::Internal(format!("payload encode failed: {e}")))?;
        Ok(Envelope::new(bytes, Bytes::new()))
    }
}

fn to_raw<T: Serialize>(data: &T) -> Result<Box<RawValue>> {
    serde_json::value::to_raw_value(data)
        .map_err(|e| OrderlineError::Internal(format!("payload data encode failed: {e}")))
}
