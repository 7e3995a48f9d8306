//! Announcements published by admins and shown to every visitor.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::filled;
use crate::db::Database;
use crate::error::{CoreError, CoreResult};
use crate::models::Event;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Blank text fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

const EVENT_NOT_FOUND: &str = "Event not found";

#[derive(Clone)]
pub struct EventBoard {
    db: Database,
}

impl EventBoard {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Active events, newest first.
    pub async fn active(&self) -> CoreResult<Vec<Event>> {
        self.db.list_active_events().await
    }

    pub async fn create(&self, req: NewEvent) -> CoreResult<Event> {
        let (Some(title), Some(description)) = (filled(req.title), filled(req.description))
        else {
            return Err(CoreError::validation("Title and description are required"));
        };

        let now = Utc::now();
        let event = self
            .db
            .insert_event(&Event {
                id: Uuid::new_v4().to_string(),
                title,
                description,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(event_id = %event.id, title = %event.title, "Event created");
        Ok(event)
    }

    pub async fn update(&self, event_id: &str, req: EventUpdate) -> CoreResult<Event> {
        let title = filled(req.title);
        let description = filled(req.description);
        let event = self
            .db
            .update_event(
                event_id,
                title.as_deref(),
                description.as_deref(),
                req.is_active,
                Utc::now(),
            )
            .await?
            .ok_or_else(|| CoreError::not_found(EVENT_NOT_FOUND))?;

        info!(event_id = %event.id, is_active = event.is_active, "Event updated");
        Ok(event)
    }

    pub async fn delete(&self, event_id: &str) -> CoreResult<()> {
        if !self.db.delete_event(event_id).await? {
            return Err(CoreError::not_found(EVENT_NOT_FOUND));
        }

        info!(event_id = %event_id, "Event deleted");
        Ok(())
    }
}
