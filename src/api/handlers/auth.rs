//! `/auth` endpoints that touch stored state.

use axum::extract::State;
use serde_json::json;

use crate::api::extractors::{ApiJson, Caller};
use crate::api::types::{ApiResult, EmailBody, Reply, ResetPasswordBody, ResetTokenBody};
use crate::api::AppState;
use crate::lifecycle::Registration;
use crate::models::UserProfile;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Registration>,
) -> ApiResult {
    let user = state.accounts.register(body).await?;

    Ok(Reply::created(
        "Registration successful. Please verify your email with the OTP sent.",
        json!({ "userId": user.id, "email": user.email }),
    ))
}

/// Called once the one-time code has been checked upstream.
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailBody>,
) -> ApiResult {
    let user = state.accounts.verify_email(&body.email).await?;

    Ok(Reply::ok(json!({
        "id": user.id,
        "fullName": user.full_name,
        "email": user.email,
        "isVerified": user.is_verified,
    }))
    .with_message("Email verified successfully"))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailBody>,
) -> ApiResult {
    state.accounts.forgot_password(&body.email).await?;
    Ok(Reply::done("Password reset link sent to your email."))
}

pub async fn verify_reset_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetTokenBody>,
) -> ApiResult {
    state
        .accounts
        .verify_reset_token(&body.email, &body.token)
        .await?;
    Ok(Reply::done("Token is valid."))
}

pub async fn reset_password_with_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordBody>,
) -> ApiResult {
    state
        .accounts
        .reset_password_with_token(&body.email, &body.token, &body.password_hash)
        .await?;
    Ok(Reply::done("Password has been reset successfully"))
}

/// Unverified accounts may read their own profile.
pub async fn profile(Caller(user): Caller) -> ApiResult<UserProfile> {
    Ok(Reply::ok(UserProfile::from(&user)))
}
