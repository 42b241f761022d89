use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use acadia_core::payment::PaymentMetadata;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure, timeout, or non-2xx response. Callers must not touch
    /// ledger state when initialize fails this way.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
    /// The gateway answered but refused the request.
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("payment gateway returned an unusable response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InitializeRequest {
    pub amount_minor: i64,
    pub email: String,
    pub reference: String,
    pub callback_url: String,
    pub metadata: PaymentMetadata,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub reference: String,
}

/// The gateway's current authoritative view of one transaction; safe to
/// fetch repeatedly.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedTransaction {
    pub succeeded: bool,
    pub amount_minor: i64,
    pub metadata: PaymentMetadata,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializedTransaction, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError>;
}

pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: SecretString,
}

impl PaystackClient {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Unavailable(error.to_string()))?;

        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), secret_key })
    }
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    amount: i64,
    email: &'a str,
    reference: &'a str,
    callback_url: &'a str,
    metadata: &'a PaymentMetadata,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
    metadata: serde_json::Value,
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializedTransaction, GatewayError> {
        let body = InitializeBody {
            amount: request.amount_minor,
            email: &request.email,
            reference: &request.reference,
            callback_url: &request.callback_url,
            metadata: &request.metadata,
        };

        let response = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| GatewayError::Unavailable(error.to_string()))?;

        let envelope = decode_envelope::<InitializeData>(response).await?;
        let data = envelope_data(envelope)?;

        Ok(InitializedTransaction {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        let response = self
            .http
            .get(format!("{}/transaction/verify/{reference}", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(|error| GatewayError::Unavailable(error.to_string()))?;

        let envelope = decode_envelope::<VerifyData>(response).await?;
        let data = envelope_data(envelope)?;
        verified_from_data(data)
    }
}

async fn decode_envelope<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, GatewayError> {
    let status = response.status();
    if status.is_server_error() {
        return Err(GatewayError::Unavailable(format!("gateway returned {status}")));
    }

    response
        .json::<Envelope<T>>()
        .await
        .map_err(|error| GatewayError::InvalidResponse(error.to_string()))
}

fn envelope_data<T>(envelope: Envelope<T>) -> Result<T, GatewayError> {
    if !envelope.status {
        return Err(GatewayError::Rejected(envelope.message));
    }
    envelope
        .data
        .ok_or_else(|| GatewayError::InvalidResponse("missing data payload".to_string()))
}

fn verified_from_data(data: VerifyData) -> Result<VerifiedTransaction, GatewayError> {
    let metadata: PaymentMetadata =
        serde_json::from_value(data.metadata.clone()).map_err(|error| {
            warn!(
                event_name = "gateway.verify.metadata_rejected",
                error = %error,
                "verify response carried an unrecognized metadata shape"
            );
            GatewayError::InvalidResponse(format!("unrecognized transaction metadata: {error}"))
        })?;

    Ok(VerifiedTransaction {
        succeeded: data.status == "success",
        amount_minor: data.amount,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use acadia_core::payment::PaymentMetadata;

    use super::{verified_from_data, Envelope, GatewayError, InitializeData, VerifyData};

    #[test]
    fn initialize_envelope_decodes_authorization_url() {
        let envelope: Envelope<InitializeData> = serde_json::from_value(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.example/abc123",
                "access_code": "abc123",
                "reference": "lms_1_xyz",
            },
        }))
        .expect("initialize envelope");

        let data = super::envelope_data(envelope).expect("data present");
        assert_eq!(data.authorization_url, "https://checkout.example/abc123");
        assert_eq!(data.reference, "lms_1_xyz");
    }

    #[test]
    fn refused_envelope_maps_to_rejected() {
        let envelope: Envelope<InitializeData> = serde_json::from_value(json!({
            "status": false,
            "message": "Invalid key",
        }))
        .expect("refusal envelope");

        let error = super::envelope_data(envelope).expect_err("refusal is an error");
        assert!(matches!(error, GatewayError::Rejected(message) if message == "Invalid key"));
    }

    #[test]
    fn verify_data_maps_success_status() {
        let data: VerifyData = serde_json::from_value(json!({
            "status": "success",
            "amount": 7000,
            "metadata": {
                "courseId": "c-1",
                "userId": "u-1",
                "includeAllSections": true,
                "paidSectionIds": ["s-2"],
            },
        }))
        .expect("verify data");

        let verified = verified_from_data(data).expect("valid metadata");
        assert!(verified.succeeded);
        assert_eq!(verified.amount_minor, 7000);
        assert!(matches!(verified.metadata, PaymentMetadata::Course(_)));
    }

    #[test]
    fn verify_data_maps_failed_status() {
        let data: VerifyData = serde_json::from_value(json!({
            "status": "abandoned",
            "amount": 7000,
            "metadata": { "courseId": "c-1", "userId": "u-1" },
        }))
        .expect("verify data");

        let verified = verified_from_data(data).expect("valid metadata");
        assert!(!verified.succeeded);
    }

    #[test]
    fn unknown_metadata_shape_is_an_invalid_response() {
        let data: VerifyData = serde_json::from_value(json!({
            "status": "success",
            "amount": 7000,
            "metadata": { "orderId": "o-1" },
        }))
        .expect("verify data");

        let error = verified_from_data(data).expect_err("unknown metadata must fail");
        assert!(matches!(error, GatewayError::InvalidResponse(_)));
    }
}
