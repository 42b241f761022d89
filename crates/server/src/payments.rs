//! Checkout and settlement endpoints.
//!
//! - `POST /api/payment/initialize`          — start a course / full-access purchase
//! - `POST /api/payment/section/initialize`  — start a single-section purchase
//! - `POST /api/payment/verify`              — verify-on-return from the checkout redirect
//! - `POST /api/payment/section/verify`      — same, for section purchases
//! - `POST /api/payment/webhook`             — authenticated gateway push (raw body)
//!
//! Initialize calls the gateway before touching the ledger, so a gateway
//! failure creates no PENDING state. Verify and webhook both funnel into the
//! ReconciliationService; neither channel is privileged.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use acadia_core::domain::course::{CourseId, SectionId};
use acadia_core::domain::enrollment::PaymentStatus;
use acadia_core::payment::{
    generate_reference, CoursePurchase, PaymentMetadata, PaymentOutcome, ReconcileChannel,
    SectionPurchase,
};
use acadia_core::pricing;
use acadia_core::{ApplicationError, DomainError};
use acadia_gateway::{parse_event, validate_signature, GatewayError, InitializeRequest, WebhookError};

use crate::bootstrap::AppState;
use crate::identity::Identity;
use crate::{error_response, interface_error_response, ErrorResponse};

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeCourseRequest {
    pub course_id: String,
    pub amount: i64,
    #[serde(default)]
    pub include_all_sections: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeSectionRequest {
    pub section_id: String,
    pub course_id: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub reference: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub success: bool,
    pub authorization_url: String,
    pub reference: String,
    pub course_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/payment/initialize", post(initialize_course_payment))
        .route("/api/payment/section/initialize", post(initialize_section_payment))
        .route("/api/payment/verify", post(verify_payment))
        .route("/api/payment/section/verify", post(verify_section_payment))
        .route("/api/payment/webhook", post(webhook))
        .with_state(state)
}

async fn initialize_course_payment(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<InitializeCourseRequest>,
) -> Result<Json<InitializeResponse>, ErrorResponse> {
    if request.amount <= 0 {
        return Err(error_response(StatusCode::BAD_REQUEST, "Amount must be positive"));
    }
    let Some(email) = identity.email.clone() else {
        return Err(error_response(StatusCode::BAD_REQUEST, "Payer email is required"));
    };

    let course_id = CourseId(request.course_id.clone());
    let course = state
        .courses
        .find_by_id(&course_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;
    let Some(course) = course.filter(|course| course.is_active) else {
        return Err(error_response(StatusCode::NOT_FOUND, "Course not found or inactive"));
    };

    if let Some(existing) = state
        .enrollments
        .find_by_user_course(&identity.user_id, &course_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
    {
        if existing.payment_status == PaymentStatus::Completed {
            return Err(interface_error_response(
                ApplicationError::from(DomainError::AlreadyEnrolled {
                    user_id: identity.user_id.0.clone(),
                    course_id: course_id.0.clone(),
                })
                .into_interface(request.course_id.clone()),
            ));
        }
    }

    if !pricing::validate_payment_amount(&course, request.amount, request.include_all_sections) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Amount does not match the current course price",
        ));
    }

    let reference = generate_reference();
    let paid_section_ids = course.paid_section_ids();
    let metadata = PaymentMetadata::Course(CoursePurchase {
        course_id: course_id.clone(),
        user_id: identity.user_id.clone(),
        include_all_sections: request.include_all_sections,
        paid_section_ids: (request.include_all_sections && !paid_section_ids.is_empty())
            .then_some(paid_section_ids),
    });

    let initialized = state
        .gateway
        .initialize(InitializeRequest {
            amount_minor: request.amount,
            email,
            reference: reference.clone(),
            callback_url: state.callback_url.clone(),
            metadata,
        })
        .await
        .map_err(gateway_error_response)?;

    // Only now, with the gateway transaction live, is the PENDING row
    // created or re-pointed.
    state
        .enrollments
        .begin_paid_enrollment(&identity.user_id, &course_id, &reference)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    info!(
        event_name = "payment.initialize.accepted",
        reference = %reference,
        course_id = %course_id.0,
        user_id = %identity.user_id.0,
        amount_minor = request.amount,
        include_all_sections = request.include_all_sections,
        "payment initialized"
    );

    Ok(Json(InitializeResponse {
        success: true,
        authorization_url: initialized.authorization_url,
        reference,
        course_id: course_id.0,
    }))
}

async fn initialize_section_payment(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<InitializeSectionRequest>,
) -> Result<Json<InitializeResponse>, ErrorResponse> {
    if request.amount <= 0 {
        return Err(error_response(StatusCode::BAD_REQUEST, "Amount must be positive"));
    }
    let Some(email) = identity.email.clone() else {
        return Err(error_response(StatusCode::BAD_REQUEST, "Payer email is required"));
    };

    let section_id = SectionId(request.section_id.clone());
    let course_id = CourseId(request.course_id.clone());

    let section = state
        .courses
        .find_section(&section_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;
    let Some(section) = section.filter(|section| section.is_paid) else {
        return Err(error_response(StatusCode::BAD_REQUEST, "Invalid section"));
    };
    if section.course_id != course_id {
        return Err(error_response(StatusCode::BAD_REQUEST, "Section does not belong to course"));
    }

    let enrollment = state
        .enrollments
        .find_by_user_course(&identity.user_id, &course_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .filter(|enrollment| enrollment.payment_status == PaymentStatus::Completed);
    let Some(enrollment) = enrollment else {
        return Err(error_response(StatusCode::BAD_REQUEST, "Not enrolled in course"));
    };

    if enrollment.has_paid_section(&section_id) {
        return Err(interface_error_response(
            ApplicationError::from(DomainError::AlreadyPurchased {
                section_id: section_id.0.clone(),
            })
            .into_interface(request.section_id.clone()),
        ));
    }

    if pricing::section_price(&section) != request.amount {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Amount does not match the current section price",
        ));
    }

    let reference = generate_reference();
    let metadata = PaymentMetadata::Section(SectionPurchase {
        section_id: section_id.clone(),
        course_id: course_id.clone(),
        user_id: identity.user_id.clone(),
        enrollment_id: enrollment.id.clone(),
    });

    // Section purchases create no pending ledger state; settlement appends
    // the section id when the outcome arrives.
    let initialized = state
        .gateway
        .initialize(InitializeRequest {
            amount_minor: request.amount,
            email,
            reference: reference.clone(),
            callback_url: state.callback_url.clone(),
            metadata,
        })
        .await
        .map_err(gateway_error_response)?;

    info!(
        event_name = "payment.section_initialize.accepted",
        reference = %reference,
        section_id = %section_id.0,
        course_id = %course_id.0,
        user_id = %identity.user_id.0,
        amount_minor = request.amount,
        "section payment initialized"
    );

    Ok(Json(InitializeResponse {
        success: true,
        authorization_url: initialized.authorization_url,
        reference,
        course_id: course_id.0,
    }))
}

async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ErrorResponse> {
    verify_by_reference(&state, &request.reference).await
}

async fn verify_section_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ErrorResponse> {
    verify_by_reference(&state, &request.reference).await
}

/// Shared verify-on-return path. The gateway's answer is authoritative; the
/// resulting outcome is applied through the same idempotent reconciliation
/// as the webhook channel, so reloads and races are harmless.
async fn verify_by_reference(
    state: &AppState,
    reference: &str,
) -> Result<Json<VerifyResponse>, ErrorResponse> {
    if reference.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Reference is required"));
    }

    let verified = match state.gateway.verify(reference).await {
        Ok(verified) => verified,
        Err(GatewayError::Rejected(message)) => {
            // The gateway does not know this transaction; ledger state is
            // left untouched for a later retry.
            warn!(
                event_name = "payment.verify.rejected",
                reference = %reference,
                detail = %message,
                "gateway rejected verification"
            );
            return Ok(Json(VerifyResponse { success: false, course_id: None, enrollment_id: None }));
        }
        Err(error) => return Err(gateway_error_response(error)),
    };

    let outcome = PaymentOutcome {
        reference: reference.to_string(),
        succeeded: verified.succeeded,
        amount_minor: verified.amount_minor,
        metadata: verified.metadata,
    };

    let reconciled = state
        .reconciler
        .apply_outcome(ReconcileChannel::Verify, &outcome)
        .await
        .map_err(|error| interface_error_response(error.into_interface(reference.to_string())))?;

    Ok(Json(VerifyResponse {
        success: reconciled.is_success(),
        course_id: reconciled.is_success().then(|| reconciled.course_id.0.clone()),
        enrollment_id: reconciled
            .enrollment_id
            .as_ref()
            .filter(|_| reconciled.is_success())
            .map(|id| id.0.clone()),
    }))
}

/// Raw-body webhook ingest. The HMAC signature is checked before the JSON is
/// parsed; no database write happens for unauthenticated input.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ErrorResponse> {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok())
    else {
        return Err(error_response(StatusCode::BAD_REQUEST, "Missing signature"));
    };

    if !validate_signature(&body, signature, state.webhook_secret.expose_secret().as_bytes()) {
        warn!(
            event_name = "payment.webhook.rejected_signature",
            "webhook signature validation failed"
        );
        return Err(error_response(StatusCode::BAD_REQUEST, "Invalid signature"));
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(WebhookError::UnsupportedEvent(name)) => {
            // Deliveries we do not subscribe to are acknowledged so the
            // gateway stops retrying them.
            info!(
                event_name = "payment.webhook.ignored_event",
                gateway_event = %name,
                "ignoring unsupported webhook event"
            );
            return Ok(Json(WebhookResponse { received: true }));
        }
        Err(WebhookError::MalformedPayload(detail)) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("Malformed payload: {detail}"),
            ));
        }
    };

    let outcome = event.into_outcome();
    state
        .reconciler
        .apply_outcome(ReconcileChannel::Webhook, &outcome)
        .await
        .map_err(|error| {
            interface_error_response(error.into_interface(outcome.reference.clone()))
        })?;

    Ok(Json(WebhookResponse { received: true }))
}

fn persistence_response(detail: String) -> ErrorResponse {
    interface_error_response(ApplicationError::Persistence(detail).into_interface("payment"))
}

fn gateway_error_response(error: GatewayError) -> ErrorResponse {
    match error {
        GatewayError::Rejected(message) => {
            error_response(StatusCode::BAD_REQUEST, format!("Payment initialization failed: {message}"))
        }
        GatewayError::Unavailable(detail) | GatewayError::InvalidResponse(detail) => {
            warn!(
                event_name = "payment.gateway.unavailable",
                detail = %detail,
                "payment gateway call failed"
            );
            interface_error_response(
                ApplicationError::Integration(detail).into_interface("payment"),
            )
        }
    }
}
