//! Payment-rail transaction queries.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::rows::{convert_all, StoredTransaction};
use super::{to_minor, ts, Database};
use crate::error::CoreResult;
use crate::models::{Transaction, TransactionStatus, TransactionType};

/// Filter for transaction listings.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to one owner; `None` lists everyone's (admin view)
    pub user_id: Option<String>,
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
}

impl Database {
    pub async fn get_transaction(&self, id: &str) -> CoreResult<Option<Transaction>> {
        sqlx::query_as::<_, StoredTransaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredTransaction::into_transaction)
            .transpose()
    }

    /// Transactions matching the filter, newest first, with the unpaged total.
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> CoreResult<(Vec<Transaction>, i64)> {
        let user_id = filter.user_id.as_deref();
        let kind = filter.kind.map(|k| k.as_str());
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, StoredTransaction>(
            r#"
            SELECT * FROM transactions
            WHERE (? IS NULL OR user_id = ?)
              AND (? IS NULL OR type = ?)
              AND (? IS NULL OR status = ?)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(kind)
        .bind(kind)
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE (? IS NULL OR user_id = ?)
              AND (? IS NULL OR type = ?)
              AND (? IS NULL OR status = ?)
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(kind)
        .bind(kind)
        .bind(status)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok((convert_all(rows, StoredTransaction::into_transaction)?, total))
    }
}

pub async fn insert_transaction(conn: &mut SqliteConnection, tx: &Transaction) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, user_id, amount_minor, type, status, payment_method_id,
            payment_method_type, transaction_reference, description, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.user_id)
    .bind(to_minor(tx.amount)?)
    .bind(tx.kind.as_str())
    .bind(tx.status.as_str())
    .bind(&tx.payment_method_id)
    .bind(tx.payment_method_type.as_str())
    .bind(&tx.transaction_reference)
    .bind(&tx.description)
    .bind(ts(tx.created_at))
    .bind(ts(tx.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Resolve a pending transaction to `next`, appending the admin note.
///
/// Returns `None` unless the transaction was still pending.
pub async fn resolve_pending(
    conn: &mut SqliteConnection,
    id: &str,
    next: TransactionStatus,
    admin_note: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<Option<Transaction>> {
    let note = admin_note
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| format!(" | Admin Note: {}", n));

    sqlx::query_as::<_, StoredTransaction>(
        r#"
        UPDATE transactions SET
            status = ?,
            description = description || COALESCE(?, ''),
            updated_at = ?
        WHERE id = ? AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(next.as_str())
    .bind(note)
    .bind(ts(now))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredTransaction::into_transaction)
    .transpose()
}

pub async fn find_transaction(
    conn: &mut SqliteConnection,
    id: &str,
) -> CoreResult<Option<Transaction>> {
    sqlx::query_as::<_, StoredTransaction>("SELECT * FROM transactions WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(StoredTransaction::into_transaction)
        .transpose()
}
