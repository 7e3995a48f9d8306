//! `/events` announcement board.

use axum::extract::{Path, State};

use crate::api::extractors::{AdminCaller, ApiJson};
use crate::api::types::{ApiResult, Reply};
use crate::api::AppState;
use crate::lifecycle::{EventUpdate, NewEvent};
use crate::models::Event;

/// Public; no caller required.
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Event>> {
    Ok(Reply::ok(state.events.active().await?))
}

pub async fn create(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    ApiJson(body): ApiJson<NewEvent>,
) -> ApiResult<Event> {
    let event = state.events.create(body).await?;
    Ok(Reply::created("Event created successfully", event))
}

pub async fn update(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    Path(event_id): Path<String>,
    ApiJson(body): ApiJson<EventUpdate>,
) -> ApiResult<Event> {
    let event = state.events.update(&event_id, body).await?;
    Ok(Reply::ok(event).with_message("Event updated successfully"))
}

pub async fn delete(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    Path(event_id): Path<String>,
) -> ApiResult {
    state.events.delete(&event_id).await?;
    Ok(Reply::done("Event deleted successfully"))
}
