//! Identity extraction. Session handling is an external collaborator: the
//! fronting session provider authenticates the request and forwards
//! `x-user-id` / `x-user-role` (and optionally `x-user-name` for artifact
//! rendering). This module only decides authenticated-or-not and scopes
//! every ledger operation to the forwarded user id.

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap, StatusCode};

use acadia_core::domain::enrollment::UserId;

use crate::{error_response, ErrorResponse};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Student
        }
    }
}

#[derive(Clone, Debug)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())?;

        let role = headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(Role::parse)
            .unwrap_or(Role::Student);

        let display_name = header_value(headers, USER_NAME_HEADER);
        let email = header_value(headers, USER_EMAIL_HEADER);

        Some(Self { user_id: UserId(user_id.to_string()), role, display_name, email })
    }

    /// Name embedded into rendered certificates when the provider forwards
    /// one; otherwise the opaque user id.
    pub fn learner_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id.0)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ErrorResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_headers(&parts.headers)
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

/// Admin gate: extraction fails with 403 for non-admin sessions, before any
/// handler logic runs.
#[derive(Clone, Debug)]
pub struct RequireAdmin(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for RequireAdmin {
    type Rejection = ErrorResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if identity.role != Role::Admin {
            return Err(error_response(StatusCode::FORBIDDEN, "Admin role required"));
        }
        Ok(Self(identity))
    }
}
