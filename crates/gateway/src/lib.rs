//! Payment gateway integration (Paystack wire contract).
//!
//! This crate owns the outbound HTTPS calls and the inbound webhook
//! authentication:
//! - **Client** (`client`) - initialize/verify against the gateway REST API
//! - **Webhook** (`webhook`) - HMAC-SHA512 signature validation and event
//!   parsing over the raw request body
//!
//! The correlation `reference` is always generated on our side
//! (`acadia_core::payment::generate_reference`) and carried through metadata;
//! nothing from the gateway is trusted for correlation beyond echoing it.

pub mod client;
pub mod webhook;

pub use client::{
    GatewayError, InitializeRequest, InitializedTransaction, PaymentGateway, PaystackClient,
    VerifiedTransaction,
};
pub use webhook::{
    parse_event, validate_signature, WebhookError, WebhookEvent, WebhookEventKind,
};
