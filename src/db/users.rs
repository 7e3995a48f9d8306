//! Users and referrals.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::rows::{convert_all, StoredReferral, StoredUser};
use super::{ts, Database};
use crate::error::{CoreError, CoreResult};
use crate::models::{Referral, User};

impl Database {
    // ==================== Users ====================

    pub async fn get_user(&self, id: &str) -> CoreResult<Option<User>> {
        sqlx::query_as::<_, StoredUser>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredUser::into_user)
            .transpose()
    }

    /// Lookup by email; emails are stored lowercase.
    pub async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        sqlx::query_as::<_, StoredUser>("SELECT * FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .map(StoredUser::into_user)
            .transpose()
    }

    pub async fn find_user_by_referral_code(&self, code: &str) -> CoreResult<Option<User>> {
        sqlx::query_as::<_, StoredUser>("SELECT * FROM users WHERE referral_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredUser::into_user)
            .transpose()
    }

    /// All non-admin users, newest first.
    pub async fn list_customers(&self) -> CoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, StoredUser>(
            "SELECT * FROM users WHERE is_admin = 0 ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows, StoredUser::into_user)
    }

    pub async fn update_full_name(
        &self,
        id: &str,
        full_name: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<User>> {
        sqlx::query_as::<_, StoredUser>(
            "UPDATE users SET full_name = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(full_name)
        .bind(ts(now))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(StoredUser::into_user)
        .transpose()
    }

    pub async fn count_users(&self) -> CoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ==================== Referrals ====================

    /// Referrals made by a user, newest first.
    pub async fn list_referrals(
        &self,
        referrer_id: &str,
        limit: Option<i64>,
    ) -> CoreResult<Vec<Referral>> {
        let rows = sqlx::query_as::<_, StoredReferral>(
            "SELECT * FROM referrals WHERE referrer_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(referrer_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows, StoredReferral::into_referral)
    }
}

/// Insert a freshly registered user.
pub async fn insert_user(conn: &mut SqliteConnection, user: &User) -> CoreResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (
            id, full_name, email, password_hash, is_verified, is_admin, profile_image,
            balance_minor, total_profit_minor, referral_code, referred_by, referral_count,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_verified)
    .bind(user.is_admin)
    .bind(&user.profile_image)
    .bind(&user.referral_code)
    .bind(&user.referred_by)
    .bind(ts(user.created_at))
    .bind(ts(user.updated_at))
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            if e.message().contains("users.referral_code") {
                Err(CoreError::conflict("Referral code already in use"))
            } else {
                Err(CoreError::conflict("Email already in use"))
            }
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn increment_referral_count(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    sqlx::query(
        "UPDATE users SET referral_count = referral_count + 1, updated_at = ? WHERE id = ?",
    )
    .bind(ts(now))
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Grant the admin role; returns whether the user exists.
pub async fn set_admin(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<bool> {
    let affected = sqlx::query("UPDATE users SET is_admin = 1, updated_at = ? WHERE id = ?")
        .bind(ts(now))
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

/// Mark the user verified, returning the updated row.
pub async fn mark_verified(
    conn: &mut SqliteConnection,
    email: &str,
    now: DateTime<Utc>,
) -> CoreResult<Option<User>> {
    sqlx::query_as::<_, StoredUser>(
        "UPDATE users SET is_verified = 1, updated_at = ? WHERE email = ? RETURNING *",
    )
    .bind(ts(now))
    .bind(email.trim().to_lowercase())
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredUser::into_user)
    .transpose()
}

/// Store (or clear, with `None`) the hashed reset token.
pub async fn set_reset_token(
    conn: &mut SqliteConnection,
    user_id: &str,
    token_hash: Option<&str>,
    expires: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    sqlx::query("UPDATE users SET reset_token = ?, reset_expires = ?, updated_at = ? WHERE id = ?")
        .bind(token_hash)
        .bind(expires.map(ts))
        .bind(ts(now))
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Swap in a new password hash if the token is still live; consumes the token.
pub async fn consume_reset_token(
    conn: &mut SqliteConnection,
    token_hash: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> CoreResult<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        UPDATE users SET
            password_hash = ?,
            reset_token = NULL,
            reset_expires = NULL,
            updated_at = ?
        WHERE reset_token = ? AND reset_expires > ?
        RETURNING id
        "#,
    )
    .bind(password_hash)
    .bind(ts(now))
    .bind(token_hash)
    .bind(ts(now))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(id,)| id))
}

pub async fn find_user_by_reset_token(
    conn: &mut SqliteConnection,
    token_hash: &str,
    now: DateTime<Utc>,
) -> CoreResult<Option<User>> {
    sqlx::query_as::<_, StoredUser>(
        "SELECT * FROM users WHERE reset_token = ? AND reset_expires > ?",
    )
    .bind(token_hash)
    .bind(ts(now))
    .fetch_optional(&mut *conn)
    .await?
    .map(StoredUser::into_user)
    .transpose()
}

/// Delete a non-admin user along with their payees.
pub async fn delete_customer(conn: &mut SqliteConnection, user_id: &str) -> CoreResult<bool> {
    let deleted = sqlx::query("DELETE FROM users WHERE id = ? AND is_admin = 0")
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM payment_methods WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM bank_accounts WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(true)
}

/// Create the (referrer, referred) link once; returns whether a row was added.
pub async fn insert_referral(
    conn: &mut SqliteConnection,
    id: &str,
    referrer_id: &str,
    referred_user_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO referrals (id, referrer_id, referred_user_id, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(referrer_id)
    .bind(referred_user_id)
    .bind(ts(now))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(inserted > 0)
}
