//! Balance mutation.
//!
//! Every change to a user's `balance` or `total_profit` goes through
//! [`debit`] or [`credit`]. Both run on the caller's store transaction so the
//! money movement commits or rolls back together with the entity transition
//! that caused it. Debits are a single conditional decrement, so two
//! concurrent debits can never take the balance below zero.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::db::{from_minor, to_minor, ts, Database};
use crate::error::{CoreError, CoreResult};

/// What a debit pays for; selects the rejection message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitPurpose {
    TradeStake,
    BotPlan,
}

impl DebitPurpose {
    fn insufficient_message(&self) -> &'static str {
        match self {
            DebitPurpose::TradeStake => "Insufficient balance to start this trade",
            DebitPurpose::BotPlan => "Insufficient balance to purchase this bot plan",
        }
    }
}

/// Take `amount` from the user's balance if it covers it.
pub async fn debit(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: Decimal,
    purpose: DebitPurpose,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::validation("Debit amount must be positive"));
    }
    let minor = to_minor(amount)?;

    let affected = sqlx::query(
        r#"
        UPDATE users SET balance_minor = balance_minor - ?, updated_at = ?
        WHERE id = ? AND balance_minor >= ?
        "#,
    )
    .bind(minor)
    .bind(ts(now))
    .bind(user_id)
    .bind(minor)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(match balance_of(conn, user_id).await? {
            None => CoreError::not_found("User not found"),
            Some(_) => CoreError::insufficient(purpose.insufficient_message()),
        });
    }

    debug!(user_id = %user_id, amount = %amount, ?purpose, "Balance debited");
    Ok(())
}

/// Return `amount` to the balance and add `profit` to the realized total.
///
/// `amount` already includes `profit` when a trade pays out principal plus
/// profit; pass `Decimal::ZERO` as `profit` for plain deposits.
pub async fn credit(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: Decimal,
    profit: Decimal,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    if amount < Decimal::ZERO || profit < Decimal::ZERO {
        return Err(CoreError::validation("Credit amounts must not be negative"));
    }

    let affected = sqlx::query(
        r#"
        UPDATE users SET
            balance_minor = balance_minor + ?,
            total_profit_minor = total_profit_minor + ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(to_minor(amount)?)
    .bind(to_minor(profit)?)
    .bind(ts(now))
    .bind(user_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(CoreError::not_found("User not found"));
    }

    debug!(user_id = %user_id, amount = %amount, profit = %profit, "Balance credited");
    Ok(())
}

/// Current balance, or `None` for an unknown user.
pub async fn balance_of(conn: &mut SqliteConnection, user_id: &str) -> CoreResult<Option<Decimal>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT balance_minor FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|(minor,)| from_minor(minor)))
}

/// `(balance, total_profit)` read outside any transaction.
pub async fn wallet(db: &Database, user_id: &str) -> CoreResult<Option<(Decimal, Decimal)>> {
    let row: Option<(i64, i64)> =
        sqlx::query_as("SELECT balance_minor, total_profit_minor FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?;

    Ok(row.map(|(balance, profit)| (from_minor(balance), from_minor(profit))))
}
