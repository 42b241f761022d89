//! HTTP surface for the enrollment/payment/certification engine.
//!
//! Routers by concern:
//! - `payments` — checkout initialization, verify-on-return, webhook ingest
//! - `student` — free enrollment, course player data, progress, quizzes,
//!   assignment submissions, certificates
//! - `admin` — course/section/lecture authoring and out-of-band grading
//! - `health` — readiness probe
//!
//! The session provider and object store are external collaborators; see
//! `identity` and `storage` for the trust boundaries.

pub mod admin;
pub mod bootstrap;
pub mod certificates;
pub mod health;
pub mod identity;
pub mod payments;
pub mod reconcile;
pub mod storage;
pub mod student;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use acadia_core::InterfaceError;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub type ErrorResponse = (StatusCode, Json<ApiError>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ErrorResponse {
    (status, Json(ApiError { error: message.into() }))
}

/// End users only ever see the safe message; details stay in the logs keyed
/// by the correlation id.
pub fn interface_error_response(error: InterfaceError) -> ErrorResponse {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.user_message())
}
