//! Request extractors: caller identity and enveloped body/query parsing.
//!
//! Token verification happens in front of this service; the authenticated
//! user id arrives in the `x-user-id` header and is resolved against the
//! store on every request.

use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use super::AppState;
use crate::error::CoreError;
use crate::models::User;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Any authenticated user.
#[derive(Debug, Clone)]
pub struct Caller(pub User);

/// Authenticated user with a verified email.
#[derive(Debug, Clone)]
pub struct VerifiedCaller(pub User);

/// Authenticated admin.
#[derive(Debug, Clone)]
pub struct AdminCaller(pub User);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                CoreError::Unauthenticated("Authentication required. Please log in.".to_string())
            })?;

        let user = state
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::Unauthenticated("User not found.".to_string()))?;

        Ok(Caller(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for VerifiedCaller {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Caller(user) = Caller::from_request_parts(parts, state).await?;
        if !user.is_verified {
            return Err(CoreError::forbidden(
                "Email verification required. Please verify your email to access this resource.",
            ));
        }
        Ok(VerifiedCaller(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Caller(user) = Caller::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(CoreError::forbidden("Forbidden: Admin access required"));
        }
        Ok(AdminCaller(user))
    }
}

/// JSON body whose rejection is reported as a validation error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(CoreError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection is reported as a validation error.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(CoreError))]
pub struct ApiQuery<T>(pub T);

/// JSON body that may be left out entirely; an empty body yields
/// `T::default()`. Anything else must parse.
#[derive(Debug)]
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = CoreError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(OptionalJson)
            .map_err(|e| CoreError::validation(format!("Invalid request body: {}", e)))
    }
}

impl From<JsonRejection> for CoreError {
    fn from(rejection: JsonRejection) -> Self {
        CoreError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for CoreError {
    fn from(rejection: QueryRejection) -> Self {
        CoreError::Validation(rejection.body_text())
    }
}

impl From<BytesRejection> for CoreError {
    fn from(rejection: BytesRejection) -> Self {
        CoreError::Validation(rejection.body_text())
    }
}
