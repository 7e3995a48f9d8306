//! Announcement board queries.

use chrono::{DateTime, Utc};

use super::rows::{convert_all, StoredEvent};
use super::{ts, Database};
use crate::error::CoreResult;
use crate::models::Event;

impl Database {
    /// Active events, newest first.
    pub async fn list_active_events(&self) -> CoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, StoredEvent>(
            "SELECT * FROM events WHERE is_active = 1 ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows, StoredEvent::into_event)
    }

    pub async fn insert_event(&self, event: &Event) -> CoreResult<Event> {
        let row = sqlx::query_as::<_, StoredEvent>(
            r#"
            INSERT INTO events (id, title, description, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.is_active)
        .bind(ts(event.created_at))
        .bind(ts(event.updated_at))
        .fetch_one(&self.pool)
        .await?;

        row.into_event()
    }

    /// Patch the given fields. `None` when the event does not exist.
    pub async fn update_event(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
        is_active: Option<bool>,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<Event>> {
        sqlx::query_as::<_, StoredEvent>(
            r#"
            UPDATE events SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                is_active = COALESCE(?, is_active),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(is_active)
        .bind(ts(now))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(StoredEvent::into_event)
        .transpose()
    }

    /// Returns whether a row was removed.
    pub async fn delete_event(&self, id: &str) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
