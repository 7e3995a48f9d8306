//! SQLite persistence for the ledger.
//!
//! Money columns hold integer minor units (paisa) so balance changes are
//! single `UPDATE ... SET balance_minor = balance_minor + ?` statements.
//! Timestamps are fixed-width UTC text, so string order is time order.

pub mod events;
pub mod payees;
mod rows;
pub mod subscriptions;
pub mod trades;
pub mod transactions;
pub mod users;

pub use payees::PayeeTable;
pub use rows::{
    StoredBankAccount, StoredPaymentMethod, StoredReferral, StoredSubscription, StoredTrade,
    StoredTransaction, StoredUser,
};
pub use trades::MonthlyProfit;
pub use transactions::TransactionFilter;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Shared handle to the ledger store.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the store, retrying with exponential backoff until it is
    /// reachable, then apply migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..ExponentialBackoff::default()
        };

        let pool = backoff::future::retry(policy, || {
            let options = options.clone();
            async move {
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Database not reachable, retrying");
                        backoff::Error::transient(e)
                    })
            }
        })
        .await
        .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        info!(url = %database_url, "Database ready");
        Ok(db)
    }

    /// Private in-memory store on a single long-lived connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_verified INTEGER NOT NULL DEFAULT 0,
                is_admin INTEGER NOT NULL DEFAULT 0,
                profile_image TEXT,
                balance_minor INTEGER NOT NULL DEFAULT 0 CHECK (balance_minor >= 0),
                total_profit_minor INTEGER NOT NULL DEFAULT 0,
                referral_code TEXT NOT NULL UNIQUE,
                referred_by TEXT,
                referral_count INTEGER NOT NULL DEFAULT 0,
                reset_token TEXT,
                reset_expires TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount_minor INTEGER NOT NULL,
                profit_percentage TEXT NOT NULL,
                profit_minor INTEGER NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                is_bot INTEGER NOT NULL DEFAULT 0,
                bot_type TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bot_subscriptions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                bot_type TEXT NOT NULL,
                profit_percentage TEXT NOT NULL,
                status TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0,
                inactive_reason TEXT,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                payment_proof_url TEXT,
                admin_note TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount_minor INTEGER NOT NULL,
                type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                payment_method_id TEXT,
                payment_method_type TEXT NOT NULL,
                transaction_reference TEXT,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payment_methods (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                type TEXT NOT NULL,
                account_number TEXT NOT NULL,
                account_title TEXT NOT NULL,
                bank_name TEXT,
                is_default INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bank_accounts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                bank_name TEXT NOT NULL,
                account_number TEXT NOT NULL,
                account_holder TEXT NOT NULL,
                is_default INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, account_number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS referrals (
                id TEXT PRIMARY KEY,
                referrer_id TEXT NOT NULL,
                referred_user_id TEXT NOT NULL,
                total_trade_amount_minor INTEGER NOT NULL DEFAULT 0,
                reward_amount_minor INTEGER NOT NULL DEFAULT 0,
                is_reward_claimed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(referrer_id, referred_user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id, created_at)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_due ON trades(status, end_date)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_due ON bot_subscriptions(is_active, end_date)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        // Singletons: one entitled subscription, one pending request per plan,
        // one default payee per kind
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_subscriptions_entitled ON bot_subscriptions(user_id) WHERE is_active = 1",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_subscriptions_pending ON bot_subscriptions(user_id, bot_type) WHERE status = 'pending'",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_payment_methods_default ON payment_methods(user_id) WHERE is_default = 1",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_bank_accounts_default ON bank_accounts(user_id) WHERE is_default = 1",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Open a store transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> CoreResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Get the connection pool (for advanced queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Render a timestamp in the stored fixed-width form.
pub fn ts(at: DateTime<Utc>) -> String {
    at.format(TS_FORMAT).to_string()
}

pub fn parse_ts(raw: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Internal(anyhow!("bad stored timestamp {raw:?}: {e}")))
}

pub fn parse_opt_ts(raw: Option<&str>) -> CoreResult<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}

/// PKR amount to paisa. Sub-paisa fractions are rounded.
pub fn to_minor(amount: Decimal) -> CoreResult<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.round_dp(0).to_i64())
        .ok_or_else(|| CoreError::validation("Amount is out of range"))
}

pub fn from_minor(minor: i64) -> Decimal {
    Decimal::new(minor, 2).normalize()
}

pub(crate) fn parse_decimal(raw: &str) -> CoreResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| CoreError::Internal(anyhow!("bad stored decimal {raw:?}: {e}")))
}

/// Offset for a 1-based page number.
pub(crate) fn offset(page: u32, limit: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(limit)
}

/// Seed data for store-backed tests.
#[cfg(test)]
pub mod fixtures {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{to_minor, users, Database};
    use crate::models::{generate_referral_code, User};

    pub async fn seed_user(db: &Database, email: &str, balance: Decimal) -> User {
        seed(db, email, balance, false).await
    }

    pub async fn seed_admin(db: &Database, email: &str) -> User {
        seed(db, email, Decimal::ZERO, true).await
    }

    async fn seed(db: &Database, email: &str, balance: Decimal, is_admin: bool) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            full_name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: "hashed".to_string(),
            is_verified: true,
            is_admin,
            profile_image: None,
            balance,
            total_profit: Decimal::ZERO,
            referral_code: generate_referral_code("Test User"),
            referred_by: None,
            referral_count: 0,
            reset_token: None,
            reset_expires: None,
            created_at: now,
            updated_at: now,
        };

        let mut conn = db.pool().acquire().await.unwrap();
        users::insert_user(&mut conn, &user).await.unwrap();
        sqlx::query("UPDATE users SET balance_minor = ? WHERE id = ?")
            .bind(to_minor(balance).unwrap())
            .bind(&user.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor(dec!(5000)).unwrap(), 500_000);
        assert_eq!(to_minor(dec!(1728.305)).unwrap(), 172_830);
        assert_eq!(from_minor(172_830), dec!(1728.3));
        assert_eq!(from_minor(50_000), dec!(500));
    }

    #[test]
    fn test_minor_units_out_of_range() {
        for amount in [Decimal::MAX, Decimal::MIN, dec!(1e20)] {
            let err = to_minor(amount).unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
            assert_eq!(err.to_string(), "Amount is out of range");
        }
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap();
        assert!(ts(a) < ts(b));
        assert_eq!(parse_ts(&ts(a)).unwrap(), a);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'trades', 'bot_subscriptions', 'transactions', 'payment_methods', 'bank_accounts', 'referrals', 'events')",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(count, 8);
    }
}
