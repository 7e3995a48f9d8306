//! `/users` endpoints.

use axum::extract::{Path, State};
use chrono::Utc;

use crate::api::extractors::{AdminCaller, ApiJson, VerifiedCaller};
use crate::api::types::{ApiResult, ProfileBody, Reply};
use crate::api::AppState;
use crate::lifecycle::{Dashboard, ReferralSummary, UserDetail};
use crate::models::{User, UserSummary};

pub async fn update_profile(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiJson(body): ApiJson<ProfileBody>,
) -> ApiResult<UserSummary> {
    let updated = state.accounts.update_profile(&user.id, &body.full_name).await?;
    Ok(Reply::ok(UserSummary::from(&updated)).with_message("Profile updated successfully"))
}

pub async fn dashboard(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
) -> ApiResult<Dashboard> {
    Ok(Reply::ok(state.accounts.dashboard(&user.id, Utc::now()).await?))
}

pub async fn referrals(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
) -> ApiResult<ReferralSummary> {
    Ok(Reply::ok(state.accounts.referrals(&user.id).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
) -> ApiResult<Vec<User>> {
    let users = state.accounts.list_users().await?;
    Ok(Reply::ok(users).with_message("Users retrieved successfully"))
}

pub async fn user_detail(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    Path(user_id): Path<String>,
) -> ApiResult<UserDetail> {
    let detail = state.accounts.user_detail(&user_id).await?;
    Ok(Reply::ok(detail).with_message("User details retrieved successfully"))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    Path(user_id): Path<String>,
) -> ApiResult {
    state.accounts.delete_user(&user_id).await?;
    Ok(Reply::done("User deleted successfully"))
}
