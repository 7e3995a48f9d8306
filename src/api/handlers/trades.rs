//! `/trades` endpoints.

use axum::extract::{Path, State};
use chrono::Utc;
use serde_json::json;

use crate::api::extractors::{ApiJson, ApiQuery, OptionalJson, VerifiedCaller};
use crate::api::types::{ApiResult, Reply, TradeQuery};
use crate::api::AppState;
use crate::error::CoreError;
use crate::lifecycle::{CompleteTrade, PageRequest, StartTrade};
use crate::models::{Trade, TradeStatus};

pub async fn start(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiJson(body): ApiJson<StartTrade>,
) -> ApiResult<Trade> {
    let trade = state.trades.start(&user.id, body).await?;
    Ok(Reply::created("Trade started successfully", trade))
}

pub async fn list(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiQuery(query): ApiQuery<TradeQuery>,
) -> ApiResult {
    let status = query
        .status
        .as_deref()
        .map(|s| TradeStatus::parse(s).ok_or_else(|| CoreError::validation("Invalid trade status")))
        .transpose()?;
    let page = PageRequest::new(query.page.unwrap_or(1), query.limit.unwrap_or(10));

    let page = state.trades.list(&user.id, status, query.is_bot, page).await?;
    Ok(Reply::ok(json!({
        "trades": page.items,
        "pagination": page.pagination,
    })))
}

pub async fn get(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    Path(trade_id): Path<String>,
) -> ApiResult<Trade> {
    let trade = state.trades.get(&user.id, &trade_id).await?;
    Ok(Reply::ok(trade))
}

pub async fn complete(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    Path(trade_id): Path<String>,
    OptionalJson(body): OptionalJson<CompleteTrade>,
) -> ApiResult<Trade> {
    let trade = state.trades.complete(&user.id, &trade_id, body).await?;
    Ok(Reply::ok(trade).with_message("Trade completed successfully"))
}

pub async fn graph_data(State(state): State<AppState>, VerifiedCaller(_): VerifiedCaller) -> ApiResult {
    let points = state.trades.graph_data(Utc::now());
    Ok(Reply::ok(json!({ "dataPoints": points })))
}
