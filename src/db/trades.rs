//! Trade queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use super::rows::{convert_all, StoredTrade};
use super::{from_minor, ts, Database};
use crate::error::CoreResult;
use crate::models::{Trade, TradeStatus};

/// Realized profit for one calendar month (`YYYY-MM`).
#[derive(Debug, Clone)]
pub struct MonthlyProfit {
    pub month: String,
    pub profit: Decimal,
}

impl Database {
    pub async fn get_trade_for_user(&self, id: &str, user_id: &str) -> CoreResult<Option<Trade>> {
        sqlx::query_as::<_, StoredTrade>("SELECT * FROM trades WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredTrade::into_trade)
            .transpose()
    }

    /// A user's trades, newest first, with the unpaged total.
    pub async fn list_trades(
        &self,
        user_id: &str,
        status: Option<TradeStatus>,
        is_bot: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> CoreResult<(Vec<Trade>, i64)> {
        let status = status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, StoredTrade>(
            r#"
            SELECT * FROM trades
            WHERE user_id = ?
              AND (? IS NULL OR status = ?)
              AND (? IS NULL OR is_bot = ?)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(status)
        .bind(is_bot)
        .bind(is_bot)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM trades
            WHERE user_id = ?
              AND (? IS NULL OR status = ?)
              AND (? IS NULL OR is_bot = ?)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(status)
        .bind(is_bot)
        .bind(is_bot)
        .fetch_one(&self.pool)
        .await?;

        Ok((convert_all(rows, StoredTrade::into_trade)?, total))
    }

    /// Most recent trades of a user regardless of status.
    pub async fn recent_trades(&self, user_id: &str, limit: i64) -> CoreResult<Vec<Trade>> {
        let rows = sqlx::query_as::<_, StoredTrade>(
            "SELECT * FROM trades WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows, StoredTrade::into_trade)
    }

    /// Ids of active trades whose term has run out.
    pub async fn due_trade_ids(&self, now: DateTime<Utc>) -> CoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM trades WHERE status = 'active' AND end_date <= ? ORDER BY end_date",
        )
        .bind(ts(now))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// `(active, completed)` trade counts for a user.
    pub async fn trade_counts(&self, user_id: &str) -> CoreResult<(i64, i64)> {
        let (active, completed): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
            FROM trades WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((active, completed))
    }

    /// Profit of completed trades grouped by completion month, oldest first.
    pub async fn monthly_profit(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<MonthlyProfit>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT substr(end_date, 1, 7) AS month, SUM(profit_minor)
            FROM trades
            WHERE user_id = ? AND status = 'completed' AND end_date >= ?
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(user_id)
        .bind(ts(since))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(month, profit)| MonthlyProfit {
                month,
                profit: from_minor(profit),
            })
            .collect())
    }
}

pub async fn insert_trade(conn: &mut SqliteConnection, trade: &Trade) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO trades (
            id, user_id, amount_minor, profit_percentage, profit_minor,
            start_date, end_date, status, is_bot, bot_type, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&trade.id)
    .bind(&trade.user_id)
    .bind(super::to_minor(trade.amount)?)
    .bind(trade.profit_percentage.to_string())
    .bind(super::to_minor(trade.profit_amount)?)
    .bind(ts(trade.start_date))
    .bind(ts(trade.end_date))
    .bind(trade.status.as_str())
    .bind(trade.is_bot)
    .bind(trade.bot_type.map(|b| b.as_str()))
    .bind(ts(trade.created_at))
    .bind(ts(trade.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Flip an owner's active trade to completed, ending its term now.
///
/// `None` terms keep the stored values. Returns `None` when the trade is no
/// longer active; only the caller whose update matched may credit the payout.
pub async fn close_trade(
    conn: &mut SqliteConnection,
    id: &str,
    user_id: &str,
    profit_percentage: Option<Decimal>,
    profit_amount: Option<Decimal>,
    now: DateTime<Utc>,
) -> CoreResult<Option<Trade>> {
    let profit_minor = profit_amount.map(super::to_minor).transpose()?;

    sqlx::query_as::<_, StoredTrade>(
        r#"
        UPDATE trades SET
            status = 'completed',
            profit_percentage = COALESCE(?, profit_percentage),
            profit_minor = COALESCE(?, profit_minor),
            end_date = ?,
            updated_at = ?
        WHERE id = ? AND user_id = ? AND status = 'active'
        RETURNING *
        "#,
    )
    .bind(profit_percentage.map(|p| p.to_string()))
    .bind(profit_minor)
    .bind(ts(now))
    .bind(ts(now))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredTrade::into_trade)
    .transpose()
}

/// Flip a trade to completed only if it is active and its term has ended.
/// The stored profit and end date are kept.
pub async fn close_due_trade(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> CoreResult<Option<Trade>> {
    sqlx::query_as::<_, StoredTrade>(
        r#"
        UPDATE trades SET status = 'completed', updated_at = ?
        WHERE id = ? AND status = 'active' AND end_date <= ?
        RETURNING *
        "#,
    )
    .bind(ts(now))
    .bind(id)
    .bind(ts(now))
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredTrade::into_trade)
    .transpose()
}
