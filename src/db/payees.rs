//! Payment method and bank account queries.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::rows::{convert_all, StoredBankAccount, StoredPaymentMethod};
use super::{ts, Database};
use crate::error::CoreResult;
use crate::models::{BankAccount, PaymentMethod};

impl Database {
    // ==================== Payment Methods ====================

    pub async fn list_payment_methods(&self, user_id: &str) -> CoreResult<Vec<PaymentMethod>> {
        let rows = sqlx::query_as::<_, StoredPaymentMethod>(
            "SELECT * FROM payment_methods WHERE user_id = ? ORDER BY created_at, rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows, StoredPaymentMethod::into_method)
    }

    /// Payment method by id, scoped to its owner.
    pub async fn get_payment_method(
        &self,
        id: &str,
        user_id: &str,
    ) -> CoreResult<Option<PaymentMethod>> {
        sqlx::query_as::<_, StoredPaymentMethod>(
            "SELECT * FROM payment_methods WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(StoredPaymentMethod::into_method)
        .transpose()
    }

    /// Payment method by id regardless of owner, for display joins.
    pub async fn find_payment_method(&self, id: &str) -> CoreResult<Option<PaymentMethod>> {
        sqlx::query_as::<_, StoredPaymentMethod>("SELECT * FROM payment_methods WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredPaymentMethod::into_method)
            .transpose()
    }

    /// Insert; the user's first method becomes the default.
    pub async fn insert_payment_method(&self, method: &PaymentMethod) -> CoreResult<PaymentMethod> {
        let row = sqlx::query_as::<_, StoredPaymentMethod>(
            r#"
            INSERT INTO payment_methods (
                id, user_id, type, account_number, account_title, bank_name,
                is_default, created_at, updated_at
            ) VALUES (
                ?, ?, ?, ?, ?, ?,
                NOT EXISTS (SELECT 1 FROM payment_methods WHERE user_id = ?),
                ?, ?
            )
            RETURNING *
            "#,
        )
        .bind(&method.id)
        .bind(&method.user_id)
        .bind(method.kind.as_str())
        .bind(&method.account_number)
        .bind(&method.account_title)
        .bind(&method.bank_name)
        .bind(&method.user_id)
        .bind(ts(method.created_at))
        .bind(ts(method.updated_at))
        .fetch_one(&self.pool)
        .await?;

        row.into_method()
    }

    /// Update the title and, for bank methods, the bank name.
    pub async fn update_payment_method(
        &self,
        id: &str,
        user_id: &str,
        account_title: Option<&str>,
        bank_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<PaymentMethod>> {
        sqlx::query_as::<_, StoredPaymentMethod>(
            r#"
            UPDATE payment_methods SET
                account_title = COALESCE(?, account_title),
                bank_name = CASE WHEN type = 'bank' THEN COALESCE(?, bank_name) ELSE bank_name END,
                updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING *
            "#,
        )
        .bind(account_title)
        .bind(bank_name)
        .bind(ts(now))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(StoredPaymentMethod::into_method)
        .transpose()
    }

    // ==================== Bank Accounts ====================

    pub async fn list_bank_accounts(&self, user_id: &str) -> CoreResult<Vec<BankAccount>> {
        let rows = sqlx::query_as::<_, StoredBankAccount>(
            "SELECT * FROM bank_accounts WHERE user_id = ? ORDER BY created_at, rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows, StoredBankAccount::into_account)
    }

    /// Insert; the user's first account becomes the default. `None` when the
    /// account number is already on file for this user.
    pub async fn insert_bank_account(&self, account: &BankAccount) -> CoreResult<Option<BankAccount>> {
        let result = sqlx::query_as::<_, StoredBankAccount>(
            r#"
            INSERT INTO bank_accounts (
                id, user_id, bank_name, account_number, account_holder,
                is_default, created_at, updated_at
            ) VALUES (
                ?, ?, ?, ?, ?,
                NOT EXISTS (SELECT 1 FROM bank_accounts WHERE user_id = ?),
                ?, ?
            )
            RETURNING *
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.bank_name)
        .bind(&account.account_number)
        .bind(&account.account_holder)
        .bind(&account.user_id)
        .bind(ts(account.created_at))
        .bind(ts(account.updated_at))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.into_account().map(Some),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update_bank_account(
        &self,
        id: &str,
        user_id: &str,
        bank_name: Option<&str>,
        account_holder: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<BankAccount>> {
        sqlx::query_as::<_, StoredBankAccount>(
            r#"
            UPDATE bank_accounts SET
                bank_name = COALESCE(?, bank_name),
                account_holder = COALESCE(?, account_holder),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING *
            "#,
        )
        .bind(bank_name)
        .bind(account_holder)
        .bind(ts(now))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(StoredBankAccount::into_account)
        .transpose()
    }
}

/// Which payee table a default-flag operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayeeTable {
    PaymentMethods,
    BankAccounts,
}

impl PayeeTable {
    fn name(&self) -> &'static str {
        match self {
            PayeeTable::PaymentMethods => "payment_methods",
            PayeeTable::BankAccounts => "bank_accounts",
        }
    }
}

/// Clear the default flag on all of a user's payees, then set it on one.
///
/// Returns `false` if `id` is not owned by the user; the caller rolls back.
pub async fn set_default(
    conn: &mut SqliteConnection,
    table: PayeeTable,
    id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<bool> {
    let clear = format!(
        "UPDATE {} SET is_default = 0, updated_at = ? WHERE user_id = ? AND is_default = 1",
        table.name()
    );
    sqlx::query(&clear)
        .bind(ts(now))
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let set = format!(
        "UPDATE {} SET is_default = 1, updated_at = ? WHERE id = ? AND user_id = ?",
        table.name()
    );
    let affected = sqlx::query(&set)
        .bind(ts(now))
        .bind(id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(affected > 0)
}

/// Delete a payee; if it was the default, the oldest remaining one takes over.
///
/// Returns `false` if `id` is not owned by the user.
pub async fn delete_payee(
    conn: &mut SqliteConnection,
    table: PayeeTable,
    id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<bool> {
    let delete = format!(
        "DELETE FROM {} WHERE id = ? AND user_id = ? RETURNING is_default",
        table.name()
    );
    let deleted: Option<(bool,)> = sqlx::query_as(&delete)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some((was_default,)) = deleted else {
        return Ok(false);
    };

    if was_default {
        let promote = format!(
            r#"
            UPDATE {table} SET is_default = 1, updated_at = ?
            WHERE id = (SELECT id FROM {table} WHERE user_id = ? ORDER BY created_at, rowid LIMIT 1)
            "#,
            table = table.name()
        );
        sqlx::query(&promote)
            .bind(ts(now))
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(true)
}
