//! Accounts: registration, email verification, password reset, dashboards
//! and admin user management.
//!
//! Password hashing and token issuance happen outside this crate; the
//! service only ever sees the finished password hash.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{users, Database};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    generate_referral_code, MaskedBankAccount, Referral, TradeStatus, User, UserSummary,
    REWARD_THRESHOLD,
};

/// Reset links stay valid this long.
const RESET_TOKEN_TTL_MINUTES: i64 = 3;

const INVALID_RESET_TOKEN: &str = "Password reset token is invalid or has expired.";

/// Outbound mail delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes outgoing mail to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(to = %to, subject = %subject, body = %body, "Outgoing mail");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPerformance {
    /// Abbreviated month name, e.g. `Jan`
    pub month: String,
    pub profit: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user: UserSummary,
    pub balance: Decimal,
    pub total_profit: Decimal,
    pub referral_count: i64,
    pub bank_accounts: Vec<MaskedBankAccount>,
    pub active_trades: i64,
    pub completed_trades: i64,
    /// Last six months, oldest first, ending with the current month
    pub performance: Vec<MonthPerformance>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralEntry {
    pub id: String,
    pub user: Option<UserSummary>,
    pub trade_amount: Decimal,
    pub reward_amount: Decimal,
    pub is_reward_claimed: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummary {
    pub referral_code: String,
    pub referral_count: usize,
    pub referral_link: String,
    pub eligible_for_reward: bool,
    pub total_reward: Decimal,
    pub referrals: Vec<ReferralEntry>,
}

/// Bank account as listed on the admin user page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayeeLabel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentReferral {
    pub id: String,
    pub user: Option<UserSummary>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTrade {
    pub id: String,
    /// `bot` or `manual`
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub amount: Decimal,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub payment_methods: Vec<PayeeLabel>,
    pub referrals: Vec<RecentReferral>,
    pub transactions: Vec<RecentTrade>,
}

#[derive(Clone)]
pub struct AccountService {
    db: Database,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl AccountService {
    pub fn new(db: Database, mailer: Arc<dyn Mailer>, frontend_url: impl Into<String>) -> Self {
        Self {
            db,
            mailer,
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        }
    }

    // ==================== Registration ====================

    /// Create an unverified user with a zero balance.
    ///
    /// An unknown referral code is ignored; a known one links the new user
    /// to the referrer and bumps the referrer's count.
    pub async fn register(&self, req: Registration) -> CoreResult<User> {
        let full_name = req.full_name.trim().to_string();
        let email = req.email.trim().to_lowercase();
        if full_name.is_empty() {
            return Err(CoreError::validation("Full name is required"));
        }
        if !email.contains('@') {
            return Err(CoreError::validation("A valid email is required"));
        }
        if req.password_hash.is_empty() {
            return Err(CoreError::validation("Password is required"));
        }
        if self.db.find_user_by_email(&email).await?.is_some() {
            return Err(CoreError::conflict("Email already in use"));
        }

        let referrer = match req.referral_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let found = self.db.find_user_by_referral_code(code).await?;
                if found.is_none() {
                    warn!(email = %email, code = %code, "Unknown referral code ignored");
                }
                found
            }
            _ => None,
        };

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            referral_code: generate_referral_code(&full_name),
            full_name,
            email,
            password_hash: req.password_hash,
            is_verified: false,
            is_admin: false,
            profile_image: None,
            balance: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            referred_by: referrer.as_ref().map(|r| r.id.clone()),
            referral_count: 0,
            reset_token: None,
            reset_expires: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        users::insert_user(&mut tx, &user).await?;
        if let Some(referrer) = &referrer {
            users::increment_referral_count(&mut tx, &referrer.id, now).await?;
        }
        tx.commit().await?;

        info!(
            user_id = %user.id,
            email = %user.email,
            referred_by = ?user.referred_by,
            "User registered"
        );
        Ok(user)
    }

    /// Mark the account verified and record the referral, once.
    pub async fn verify_email(&self, email: &str) -> CoreResult<User> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let Some(user) = users::mark_verified(&mut tx, email, now).await? else {
            tx.rollback().await?;
            return Err(CoreError::not_found("User not found"));
        };

        if let Some(referrer_id) = &user.referred_by {
            let created = users::insert_referral(
                &mut tx,
                &Uuid::new_v4().to_string(),
                referrer_id,
                &user.id,
                now,
            )
            .await?;
            if created {
                info!(user_id = %user.id, referrer_id = %referrer_id, "Referral recorded");
            }
        }
        tx.commit().await?;

        Ok(user)
    }

    /// Grant the admin role to an existing user.
    pub async fn promote_admin(&self, user_id: &str) -> CoreResult<()> {
        let mut conn = self.db.pool().acquire().await?;
        if !users::set_admin(&mut conn, user_id, Utc::now()).await? {
            return Err(CoreError::not_found("User not found"));
        }
        info!(user_id = %user_id, "Admin role granted");
        Ok(())
    }

    // ==================== Password Reset ====================

    /// Issue a reset token and mail the link. The token is dropped again if
    /// the mail cannot be delivered.
    pub async fn forgot_password(&self, email: &str) -> CoreResult<()> {
        let user = self
            .db
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| CoreError::not_found("No account found with this email"))?;

        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);

        let now = Utc::now();
        let expires = now + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        let mut conn = self.db.pool().acquire().await?;
        users::set_reset_token(&mut conn, &user.id, Some(&hash_token(&token)), Some(expires), now)
            .await?;

        let link = format!(
            "{}/reset-password?token={}&email={}",
            self.frontend_url, token, user.email
        );
        let body = format!("Click the link to reset your password: {}", link);

        if let Err(e) = self
            .mailer
            .send(&user.email, "Password Reset Request", &body)
            .await
        {
            warn!(user_id = %user.id, error = %e, "Reset mail failed; clearing token");
            users::set_reset_token(&mut conn, &user.id, None, None, Utc::now()).await?;
            return Err(CoreError::Dependency(
                "Failed to send password reset email. Please try again.".to_string(),
            ));
        }

        info!(user_id = %user.id, "Password reset link sent");
        Ok(())
    }

    /// Check a reset token without consuming it.
    pub async fn verify_reset_token(&self, email: &str, token: &str) -> CoreResult<()> {
        self.reset_token_owner(email, token).await.map(|_| ())
    }

    /// Store a new password hash and consume the token.
    pub async fn reset_password_with_token(
        &self,
        email: &str,
        token: &str,
        password_hash: &str,
    ) -> CoreResult<()> {
        if password_hash.is_empty() {
            return Err(CoreError::validation("Password is required"));
        }
        let user = self.reset_token_owner(email, token).await?;

        let mut conn = self.db.pool().acquire().await?;
        let consumed =
            users::consume_reset_token(&mut conn, &hash_token(token), password_hash, Utc::now())
                .await?;
        if consumed.as_deref() != Some(user.id.as_str()) {
            return Err(CoreError::validation(INVALID_RESET_TOKEN));
        }

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    async fn reset_token_owner(&self, email: &str, token: &str) -> CoreResult<User> {
        let hashed = hash_token(token);
        let now = Utc::now();
        let mut conn = self.db.pool().acquire().await?;
        users::find_user_by_reset_token(&mut conn, &hashed, now)
            .await?
            .filter(|u| u.email == email.trim().to_lowercase() && u.reset_token_valid(&hashed, now))
            .ok_or_else(|| CoreError::validation(INVALID_RESET_TOKEN))
    }

    // ==================== Self Service ====================

    pub async fn dashboard(&self, user_id: &str, now: DateTime<Utc>) -> CoreResult<Dashboard> {
        let user = self.require_user(user_id).await?;
        let bank_accounts = self.db.list_bank_accounts(user_id).await?;
        let (active_trades, completed_trades) = self.db.trade_counts(user_id).await?;

        let months = last_six_months(now)?;
        let since = months
            .first()
            .copied()
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("empty month window")))?;
        let by_month: HashMap<String, Decimal> = self
            .db
            .monthly_profit(user_id, since)
            .await?
            .into_iter()
            .map(|m| (m.month, m.profit))
            .collect();

        let performance = months
            .iter()
            .map(|start| MonthPerformance {
                month: start.format("%b").to_string(),
                profit: by_month
                    .get(&start.format("%Y-%m").to_string())
                    .copied()
                    .unwrap_or(Decimal::ZERO),
            })
            .collect();

        Ok(Dashboard {
            user: UserSummary::from(&user),
            balance: user.balance,
            total_profit: user.total_profit,
            referral_count: user.referral_count,
            bank_accounts: bank_accounts.iter().map(|a| a.masked()).collect(),
            active_trades,
            completed_trades,
            performance,
        })
    }

    pub async fn referrals(&self, user_id: &str) -> CoreResult<ReferralSummary> {
        let user = self.require_user(user_id).await?;
        let referrals = self.db.list_referrals(user_id, None).await?;

        let total_reward: Decimal = referrals.iter().map(|r| r.reward_amount).sum();
        let mut entries = Vec::with_capacity(referrals.len());
        for referral in referrals.iter() {
            entries.push(ReferralEntry {
                id: referral.id.clone(),
                user: self.summary_of(&referral.referred_user_id).await?,
                trade_amount: referral.total_trade_amount,
                reward_amount: referral.reward_amount,
                is_reward_claimed: referral.is_reward_claimed,
                joined_at: referral.created_at,
            });
        }

        Ok(ReferralSummary {
            referral_link: format!("{}/register?ref={}", self.frontend_url, user.referral_code),
            referral_code: user.referral_code,
            referral_count: referrals.len(),
            eligible_for_reward: referrals.len() >= REWARD_THRESHOLD,
            total_reward,
            referrals: entries,
        })
    }

    pub async fn update_profile(&self, user_id: &str, full_name: &str) -> CoreResult<User> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(CoreError::validation("Full name is required"));
        }
        self.db
            .update_full_name(user_id, full_name, Utc::now())
            .await?
            .ok_or_else(|| CoreError::not_found("User not found"))
    }

    // ==================== Admin ====================

    pub async fn list_users(&self) -> CoreResult<Vec<User>> {
        self.db.list_customers().await
    }

    pub async fn user_detail(&self, user_id: &str) -> CoreResult<UserDetail> {
        let user = self.require_user(user_id).await?;

        let payment_methods = self
            .db
            .list_bank_accounts(user_id)
            .await?
            .into_iter()
            .map(|account| {
                let masked = account.masked();
                PayeeLabel {
                    name: format!("{} - {}", masked.bank_name, masked.account_number),
                    id: masked.id,
                    kind: masked.bank_name,
                    is_default: masked.is_default,
                }
            })
            .collect();

        let mut referrals = Vec::new();
        for Referral {
            id,
            referred_user_id,
            created_at,
            ..
        } in self.db.list_referrals(user_id, Some(5)).await?
        {
            referrals.push(RecentReferral {
                id,
                user: self.summary_of(&referred_user_id).await?,
                joined_at: created_at,
            });
        }

        let transactions = self
            .db
            .recent_trades(user_id, 10)
            .await?
            .into_iter()
            .map(|t| RecentTrade {
                id: t.id,
                kind: if t.is_bot { "bot" } else { "manual" },
                amount: t.amount,
                status: t.status,
                created_at: t.created_at,
            })
            .collect();

        Ok(UserDetail {
            user,
            payment_methods,
            referrals,
            transactions,
        })
    }

    /// Remove a customer and their payees; their ledger history is kept.
    pub async fn delete_user(&self, user_id: &str) -> CoreResult<()> {
        let user = self.require_user(user_id).await?;
        if user.is_admin {
            return Err(CoreError::validation("Admin users cannot be deleted"));
        }

        let mut tx = self.db.begin().await?;
        if !users::delete_customer(&mut tx, user_id).await? {
            tx.rollback().await?;
            return Err(CoreError::not_found("User not found"));
        }
        tx.commit().await?;

        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    async fn require_user(&self, user_id: &str) -> CoreResult<User> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("User not found"))
    }

    async fn summary_of(&self, user_id: &str) -> CoreResult<Option<UserSummary>> {
        Ok(self.db.get_user(user_id).await?.as_ref().map(UserSummary::from))
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// First instant of each of the six months ending with the month of `now`.
fn last_six_months(now: DateTime<Utc>) -> CoreResult<Vec<DateTime<Utc>>> {
    let current = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("invalid month start")))?;

    (0..6u32)
        .rev()
        .map(|back| {
            current
                .checked_sub_months(Months::new(back))
                .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("month out of range")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradeRules;
    use crate::db::fixtures::{seed_admin, seed_user};
    use crate::lifecycle::{CompleteTrade, NewBankAccount, PayeeBook, StartTrade, TradeManager};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, _to: &str, _subject: &str, body: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            self.sent.lock().unwrap().push(body.to_string());
            Ok(())
        }
    }

    fn service(db: &Database, mailer: Arc<dyn Mailer>) -> AccountService {
        AccountService::new(db.clone(), mailer, "https://app.example.com/")
    }

    fn registration(name: &str, email: &str, code: Option<&str>) -> Registration {
        Registration {
            full_name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            referral_code: code.map(str::to_string),
        }
    }

    fn token_from(body: &str) -> String {
        let start = body.find("token=").unwrap() + "token=".len();
        body[start..].split('&').next().unwrap().to_string()
    }

    #[test]
    fn test_six_month_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let months = last_six_months(now).unwrap();
        let labels: Vec<String> = months.iter().map(|m| m.format("%b").to_string()).collect();
        assert_eq!(labels, ["Oct", "Nov", "Dec", "Jan", "Feb", "Mar"]);
        assert_eq!(months[0], Utc.with_ymd_and_hms(2023, 10, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_registration_and_referral_once() {
        let db = Database::in_memory().await.unwrap();
        let accounts = service(&db, Arc::new(TracingMailer));

        let referrer = accounts
            .register(registration("Zara Malik", "Zara@Example.com", None))
            .await
            .unwrap();
        assert_eq!(referrer.email, "zara@example.com");
        assert!(!referrer.is_verified);
        assert_eq!(referrer.balance, dec!(0));
        assert!(referrer.referral_code.starts_with("ZAR"));

        let err = accounts
            .register(registration("Other", "zara@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let referred = accounts
            .register(registration(
                "Omar",
                "omar@example.com",
                Some(&referrer.referral_code),
            ))
            .await
            .unwrap();
        assert_eq!(referred.referred_by.as_deref(), Some(referrer.id.as_str()));

        // Unknown codes are ignored
        let loner = accounts
            .register(registration("Hina", "hina@example.com", Some("NOPE123")))
            .await
            .unwrap();
        assert!(loner.referred_by.is_none());

        let verified = accounts.verify_email("omar@example.com").await.unwrap();
        assert!(verified.is_verified);
        accounts.verify_email("omar@example.com").await.unwrap();

        let summary = accounts.referrals(&referrer.id).await.unwrap();
        assert_eq!(summary.referral_count, 1);
        assert_eq!(summary.referrals.len(), 1);
        assert_eq!(
            summary.referral_link,
            format!("https://app.example.com/register?ref={}", referrer.referral_code)
        );
        assert!(!summary.eligible_for_reward);
        assert_eq!(
            summary.referrals[0].user.as_ref().unwrap().email,
            "omar@example.com"
        );

        let stored = db.get_user(&referrer.id).await.unwrap().unwrap();
        assert_eq!(stored.referral_count, 1);

        assert!(matches!(
            accounts.verify_email("ghost@example.com").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let db = Database::in_memory().await.unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let accounts = service(&db, mailer.clone());
        let user = seed_user(&db, "reset@example.com", dec!(0)).await;

        accounts.forgot_password("reset@example.com").await.unwrap();
        let body = mailer.sent.lock().unwrap()[0].clone();
        assert!(body.contains("https://app.example.com/reset-password?token="));
        let token = token_from(&body);

        // Only the hash is stored
        let stored = db.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.reset_token, Some(hash_token(&token)));

        accounts
            .verify_reset_token("reset@example.com", &token)
            .await
            .unwrap();
        assert!(accounts
            .verify_reset_token("other@example.com", &token)
            .await
            .is_err());
        assert!(accounts
            .verify_reset_token("reset@example.com", "bogus")
            .await
            .is_err());

        accounts
            .reset_password_with_token("reset@example.com", &token, "new-hash")
            .await
            .unwrap();
        let stored = db.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
        assert!(stored.reset_token.is_none());

        let err = accounts
            .reset_password_with_token("reset@example.com", &token, "again")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_RESET_TOKEN);
    }

    #[tokio::test]
    async fn test_mail_failure_clears_token() {
        let db = Database::in_memory().await.unwrap();
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let accounts = service(&db, mailer);
        let user = seed_user(&db, "nomail@example.com", dec!(0)).await;

        let err = accounts.forgot_password("nomail@example.com").await.unwrap_err();
        assert!(matches!(err, CoreError::Dependency(_)));

        let stored = db.get_user(&user.id).await.unwrap().unwrap();
        assert!(stored.reset_token.is_none());
        assert!(stored.reset_expires.is_none());

        assert!(matches!(
            accounts.forgot_password("missing@example.com").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dashboard_figures() {
        let db = Database::in_memory().await.unwrap();
        let accounts = service(&db, Arc::new(TracingMailer));
        let trades = TradeManager::new(db.clone(), TradeRules::default());
        let user = seed_user(&db, "dash@example.com", dec!(20000)).await;

        PayeeBook::new(db.clone())
            .add_bank_account(
                &user.id,
                NewBankAccount {
                    bank_name: Some("HBL".to_string()),
                    account_number: Some("1234567890".to_string()),
                    account_holder: Some("Dash".to_string()),
                },
            )
            .await
            .unwrap();

        let done = trades
            .start(&user.id, StartTrade { amount: dec!(5000), is_bot: false })
            .await
            .unwrap();
        trades
            .complete(&user.id, &done.id, CompleteTrade::default())
            .await
            .unwrap();
        trades
            .start(&user.id, StartTrade { amount: dec!(5000), is_bot: false })
            .await
            .unwrap();

        let dashboard = accounts.dashboard(&user.id, Utc::now()).await.unwrap();
        assert_eq!(dashboard.balance, dec!(15500));
        assert_eq!(dashboard.total_profit, dec!(500));
        assert_eq!(dashboard.active_trades, 1);
        assert_eq!(dashboard.completed_trades, 1);
        assert_eq!(dashboard.bank_accounts[0].account_number, "******7890");
        assert_eq!(dashboard.performance.len(), 6);
        assert_eq!(dashboard.performance[5].profit, dec!(500));
        assert_eq!(
            dashboard.performance[5].month,
            Utc::now().format("%b").to_string()
        );
    }

    #[tokio::test]
    async fn test_admin_user_management() {
        let db = Database::in_memory().await.unwrap();
        let accounts = service(&db, Arc::new(TracingMailer));
        let admin = seed_admin(&db, "boss@example.com").await;
        let user = seed_user(&db, "cust@example.com", dec!(10000)).await;

        PayeeBook::new(db.clone())
            .add_bank_account(
                &user.id,
                NewBankAccount {
                    bank_name: Some("Meezan".to_string()),
                    account_number: Some("9876543210".to_string()),
                    account_holder: Some("Cust".to_string()),
                },
            )
            .await
            .unwrap();
        TradeManager::new(db.clone(), TradeRules::default())
            .start(&user.id, StartTrade { amount: dec!(5000), is_bot: false })
            .await
            .unwrap();

        let listed = accounts.list_users().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, user.id);

        let detail = accounts.user_detail(&user.id).await.unwrap();
        assert_eq!(detail.payment_methods[0].name, "Meezan - ******3210");
        assert_eq!(detail.transactions.len(), 1);
        assert_eq!(detail.transactions[0].kind, "manual");

        let err = accounts.delete_user(&admin.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Admin users cannot be deleted");

        accounts.delete_user(&user.id).await.unwrap();
        assert!(db.get_user(&user.id).await.unwrap().is_none());
        assert!(db.list_bank_accounts(&user.id).await.unwrap().is_empty());
        assert!(matches!(
            accounts.delete_user(&user.id).await,
            Err(CoreError::NotFound(_))
        ));

        let renamed = accounts.update_profile(&admin.id, "  Big Boss ").await.unwrap();
        assert_eq!(renamed.full_name, "Big Boss");
        assert!(accounts.update_profile(&admin.id, " ").await.is_err());
    }
}
