//! Bot subscription queries.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::rows::{convert_all, StoredSubscription};
use super::{ts, Database};
use crate::error::CoreResult;
use crate::models::{BotSubscription, InactiveReason, SubscriptionStatus};

impl Database {
    /// The subscription currently conferring its rate, if any.
    pub async fn entitled_subscription(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<BotSubscription>> {
        let mut conn = self.pool.acquire().await?;
        find_entitled(&mut conn, user_id, now).await
    }

    /// Most recent pending request of a user.
    pub async fn latest_pending_subscription(
        &self,
        user_id: &str,
    ) -> CoreResult<Option<BotSubscription>> {
        sqlx::query_as::<_, StoredSubscription>(
            r#"
            SELECT * FROM bot_subscriptions
            WHERE user_id = ? AND status = 'pending'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(StoredSubscription::into_subscription)
        .transpose()
    }

    pub async fn get_subscription(&self, id: &str) -> CoreResult<Option<BotSubscription>> {
        sqlx::query_as::<_, StoredSubscription>("SELECT * FROM bot_subscriptions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredSubscription::into_subscription)
            .transpose()
    }

    /// All subscriptions, newest first, optionally filtered by status.
    pub async fn list_subscriptions(
        &self,
        status: Option<SubscriptionStatus>,
    ) -> CoreResult<Vec<BotSubscription>> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, StoredSubscription>(
            r#"
            SELECT * FROM bot_subscriptions
            WHERE (? IS NULL OR status = ?)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows, StoredSubscription::into_subscription)
    }

    /// Ids of entitled subscriptions whose term has run out.
    pub async fn due_subscription_ids(&self, now: DateTime<Utc>) -> CoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM bot_subscriptions WHERE is_active = 1 AND end_date <= ? ORDER BY end_date",
        )
        .bind(ts(now))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

/// Entitled subscription whose term covers `now`.
pub async fn find_entitled(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<Option<BotSubscription>> {
    sqlx::query_as::<_, StoredSubscription>(
        r#"
        SELECT * FROM bot_subscriptions
        WHERE user_id = ? AND is_active = 1 AND end_date >= ?
        "#,
    )
    .bind(user_id)
    .bind(ts(now))
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredSubscription::into_subscription)
    .transpose()
}

/// Insert a subscription. Returns `false` if it would duplicate a pending
/// request for the same plan or a second entitlement.
pub async fn insert_subscription(
    conn: &mut SqliteConnection,
    sub: &BotSubscription,
) -> CoreResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO bot_subscriptions (
            id, user_id, bot_type, profit_percentage, status, is_active, inactive_reason,
            start_date, end_date, payment_proof_url, admin_note, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&sub.id)
    .bind(&sub.user_id)
    .bind(sub.bot_type.as_str())
    .bind(sub.profit_percentage.to_string())
    .bind(sub.status.as_str())
    .bind(sub.is_active)
    .bind(sub.inactive_reason.map(|r| r.as_str()))
    .bind(ts(sub.start_date))
    .bind(ts(sub.end_date))
    .bind(&sub.payment_proof_url)
    .bind(&sub.admin_note)
    .bind(ts(sub.created_at))
    .bind(ts(sub.updated_at))
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Drop the entitlement of every subscription a user holds.
///
/// An `active` workflow status follows the entitlement: it becomes
/// `expired` or `cancelled` when that is the reason, and is left as is when
/// superseded.
pub async fn deactivate_all(
    conn: &mut SqliteConnection,
    user_id: &str,
    reason: InactiveReason,
    now: DateTime<Utc>,
) -> CoreResult<u64> {
    let next_status = status_after(reason);

    let affected = sqlx::query(
        r#"
        UPDATE bot_subscriptions SET
            is_active = 0,
            inactive_reason = ?,
            status = CASE WHEN status = 'active' AND ? IS NOT NULL THEN ? ELSE status END,
            updated_at = ?
        WHERE user_id = ? AND is_active = 1
        "#,
    )
    .bind(reason.as_str())
    .bind(next_status)
    .bind(next_status)
    .bind(ts(now))
    .bind(user_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(affected)
}

/// Drop the entitlement of every subscription held by the owner of a
/// pending request, ahead of approving it.
pub async fn supersede_for_pending(
    conn: &mut SqliteConnection,
    pending_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<u64> {
    let affected = sqlx::query(
        r#"
        UPDATE bot_subscriptions SET
            is_active = 0,
            inactive_reason = 'superseded',
            updated_at = ?
        WHERE is_active = 1
          AND user_id = (SELECT user_id FROM bot_subscriptions WHERE id = ? AND status = 'pending')
        "#,
    )
    .bind(ts(now))
    .bind(pending_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(affected)
}

/// Cancel the caller's entitled subscription.
pub async fn cancel_entitled(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<Option<BotSubscription>> {
    sqlx::query_as::<_, StoredSubscription>(
        r#"
        UPDATE bot_subscriptions SET
            is_active = 0,
            status = 'cancelled',
            inactive_reason = 'cancelled',
            updated_at = ?
        WHERE user_id = ? AND is_active = 1
        RETURNING *
        "#,
    )
    .bind(ts(now))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredSubscription::into_subscription)
    .transpose()
}

/// Expire one subscription if it is still entitled and past its end date.
pub async fn expire_due(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> CoreResult<Option<BotSubscription>> {
    sqlx::query_as::<_, StoredSubscription>(
        r#"
        UPDATE bot_subscriptions SET
            is_active = 0,
            inactive_reason = 'expired',
            status = CASE WHEN status = 'active' THEN 'expired' ELSE status END,
            updated_at = ?
        WHERE id = ? AND is_active = 1 AND end_date <= ?
        RETURNING *
        "#,
    )
    .bind(ts(now))
    .bind(id)
    .bind(ts(now))
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredSubscription::into_subscription)
    .transpose()
}

/// Move a pending request to active and entitled, restarting its term.
pub async fn activate_pending(
    conn: &mut SqliteConnection,
    id: &str,
    admin_note: Option<&str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CoreResult<Option<BotSubscription>> {
    sqlx::query_as::<_, StoredSubscription>(
        r#"
        UPDATE bot_subscriptions SET
            status = 'active',
            is_active = 1,
            inactive_reason = NULL,
            start_date = ?,
            end_date = ?,
            admin_note = COALESCE(?, admin_note),
            updated_at = ?
        WHERE id = ? AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(ts(start))
    .bind(ts(end))
    .bind(admin_note)
    .bind(ts(start))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredSubscription::into_subscription)
    .transpose()
}

pub async fn reject_pending(
    conn: &mut SqliteConnection,
    id: &str,
    admin_note: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<Option<BotSubscription>> {
    sqlx::query_as::<_, StoredSubscription>(
        r#"
        UPDATE bot_subscriptions SET
            status = 'rejected',
            admin_note = COALESCE(?, admin_note),
            updated_at = ?
        WHERE id = ? AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(admin_note)
    .bind(ts(now))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredSubscription::into_subscription)
    .transpose()
}

fn status_after(reason: InactiveReason) -> Option<&'static str> {
    match reason {
        InactiveReason::Expired => Some(SubscriptionStatus::Expired.as_str()),
        InactiveReason::Cancelled => Some(SubscriptionStatus::Cancelled.as_str()),
        InactiveReason::Superseded => None,
    }
}
