//! `/bots` endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;

use crate::api::extractors::{AdminCaller, ApiJson, ApiQuery, VerifiedCaller};
use crate::api::types::{ApiResult, PlanBody, Reply, ReviewBody, StatusQuery};
use crate::api::AppState;
use crate::error::CoreError;
use crate::lifecycle::{SubscriptionManager, SubscriptionOverview, SubscriptionView};
use crate::models::{BotPlan, ReviewAction, SubscriptionStatus};

pub async fn plans(State(state): State<AppState>) -> ApiResult<Vec<BotPlan>> {
    Ok(Reply::ok(state.subscriptions.plans()))
}

pub async fn subscription(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
) -> ApiResult {
    let reply = match state.subscriptions.overview(&user.id, Utc::now()).await? {
        SubscriptionOverview::Active {
            subscription,
            remaining_days,
        } => Reply::ok(json!({
            "isActive": true,
            "isPending": false,
            "id": subscription.id,
            "botType": subscription.bot_type,
            "profitPercentage": subscription.profit_percentage,
            "startDate": subscription.start_date,
            "endDate": subscription.end_date,
            "remainingDays": remaining_days,
        })),
        SubscriptionOverview::Pending {
            bot_type,
            requested_at,
        } => Reply::ok(json!({
            "isActive": false,
            "isPending": true,
            "botType": bot_type,
            "requestedAt": requested_at,
        })),
        SubscriptionOverview::None => Reply::ok(json!({ "isActive": false, "isPending": false }))
            .with_status(StatusCode::NOT_FOUND)
            .with_message("No active bot subscription found"),
    };
    Ok(reply)
}

pub async fn purchase(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiJson(body): ApiJson<PlanBody>,
) -> ApiResult {
    let bot_type = SubscriptionManager::parse_plan(&body.plan_id)?;
    let sub = state.subscriptions.purchase(&user.id, bot_type).await?;

    Ok(Reply::created(
        "Bot plan purchased successfully",
        json!({
            "id": sub.id,
            "botType": sub.bot_type,
            "profitPercentage": sub.profit_percentage,
            "startDate": sub.start_date,
            "endDate": sub.end_date,
            "isActive": sub.is_active,
        }),
    ))
}

pub async fn request_subscription(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiJson(body): ApiJson<PlanBody>,
) -> ApiResult {
    let bot_type = SubscriptionManager::parse_plan(&body.plan_id)?;
    let sub = state
        .subscriptions
        .request(&user.id, bot_type, body.payment_proof_url)
        .await?;

    Ok(Reply::created(
        "Bot subscription request submitted successfully. It will be reviewed by our team.",
        json!({ "requestId": sub.id }),
    ))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
) -> ApiResult {
    state.subscriptions.cancel(&user.id).await?;
    Ok(Reply::done("Bot subscription cancelled successfully"))
}

pub async fn admin_list(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> ApiResult<Vec<SubscriptionView>> {
    // Unknown status values list everything
    let status = query.status.as_deref().and_then(SubscriptionStatus::parse);
    Ok(Reply::ok(state.subscriptions.admin_list(status).await?))
}

pub async fn review(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    Path(subscription_id): Path<String>,
    ApiJson(body): ApiJson<ReviewBody>,
) -> ApiResult {
    let action = match body.action.as_str() {
        "approve" => ReviewAction::Approve,
        "reject" => ReviewAction::Reject,
        _ => {
            return Err(CoreError::validation(
                "Invalid action. Must be 'approve' or 'reject'",
            ))
        }
    };

    state
        .subscriptions
        .review(&subscription_id, action, body.admin_note.as_deref())
        .await?;

    Ok(Reply::done(match action {
        ReviewAction::Approve => "Bot subscription approved successfully",
        ReviewAction::Reject => "Bot subscription rejected successfully",
    }))
}
