//! Inbound webhook authentication and decoding.
//!
//! Signature validation runs over the raw, unparsed body; a payload whose
//! signature does not match is rejected before its JSON is ever read.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use thiserror::Error;

use acadia_core::payment::{PaymentMetadata, PaymentOutcome};

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Error, PartialEq)]
pub enum WebhookError {
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported webhook event `{0}`")]
    UnsupportedEvent(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookEventKind {
    ChargeSuccess,
    ChargeFailed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WebhookEvent {
    pub kind: WebhookEventKind,
    pub reference: String,
    pub metadata: PaymentMetadata,
    pub amount_minor: i64,
}

impl WebhookEvent {
    pub fn into_outcome(self) -> PaymentOutcome {
        PaymentOutcome {
            reference: self.reference,
            succeeded: self.kind == WebhookEventKind::ChargeSuccess,
            amount_minor: self.amount_minor,
            metadata: self.metadata,
        }
    }
}

/// HMAC-SHA512 over the raw body, hex-encoded, compared against the
/// signature header value.
pub fn validate_signature(raw_body: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret) else {
        return false;
    };
    mac.update(raw_body);
    let expected = encode_hex(mac.finalize().into_bytes().as_slice());

    expected == signature_header.trim().to_ascii_lowercase()
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    event: String,
    data: WireData,
}

#[derive(Debug, Deserialize)]
struct WireData {
    reference: String,
    #[serde(default)]
    amount: i64,
    metadata: serde_json::Value,
}

/// Decodes an authenticated payload. Call only after `validate_signature`
/// has accepted the raw body.
pub fn parse_event(raw_body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let payload: WirePayload = serde_json::from_slice(raw_body)
        .map_err(|error| WebhookError::MalformedPayload(error.to_string()))?;

    let kind = match payload.event.as_str() {
        "charge.success" => WebhookEventKind::ChargeSuccess,
        "charge.failed" => WebhookEventKind::ChargeFailed,
        other => return Err(WebhookError::UnsupportedEvent(other.to_string())),
    };

    let metadata: PaymentMetadata = serde_json::from_value(payload.data.metadata)
        .map_err(|error| WebhookError::MalformedPayload(format!("metadata: {error}")))?;

    Ok(WebhookEvent {
        kind,
        reference: payload.data.reference,
        metadata,
        amount_minor: payload.data.amount,
    })
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
