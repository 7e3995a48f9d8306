//! Stored row shapes and their conversion into ledger models.

use anyhow::anyhow;

use super::{from_minor, parse_decimal, parse_opt_ts, parse_ts};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    BankAccount, BotSubscription, BotType, Event, InactiveReason, PaymentMethod, PaymentMethodType,
    Referral, SubscriptionStatus, Trade, TradeStatus, Transaction, TransactionStatus,
    TransactionType, User,
};

fn bad(column: &str, raw: &str) -> CoreError {
    CoreError::Internal(anyhow!("unexpected {column} value {raw:?}"))
}

/// Stored user record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredUser {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub is_admin: bool,
    pub profile_image: Option<String>,
    pub balance_minor: i64,
    pub total_profit_minor: i64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub referral_count: i64,
    pub reset_token: Option<String>,
    pub reset_expires: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredUser {
    pub fn into_user(self) -> CoreResult<User> {
        Ok(User {
            reset_expires: parse_opt_ts(self.reset_expires.as_deref())?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            full_name: self.full_name,
            email: self.email,
            password_hash: self.password_hash,
            is_verified: self.is_verified,
            is_admin: self.is_admin,
            profile_image: self.profile_image,
            balance: from_minor(self.balance_minor),
            total_profit: from_minor(self.total_profit_minor),
            referral_code: self.referral_code,
            referred_by: self.referred_by,
            referral_count: self.referral_count,
            reset_token: self.reset_token,
        })
    }
}

/// Stored trade record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTrade {
    pub id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub profit_percentage: String,
    pub profit_minor: i64,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub is_bot: bool,
    pub bot_type: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredTrade {
    pub fn into_trade(self) -> CoreResult<Trade> {
        let status =
            TradeStatus::parse(&self.status).ok_or_else(|| bad("trade status", &self.status))?;
        let bot_type = match self.bot_type.as_deref() {
            Some(raw) => Some(BotType::parse(raw).ok_or_else(|| bad("bot type", raw))?),
            None => None,
        };

        Ok(Trade {
            amount: from_minor(self.amount_minor),
            profit_percentage: parse_decimal(&self.profit_percentage)?,
            profit_amount: from_minor(self.profit_minor),
            start_date: parse_ts(&self.start_date)?,
            end_date: parse_ts(&self.end_date)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            status,
            bot_type,
            id: self.id,
            user_id: self.user_id,
            is_bot: self.is_bot,
        })
    }
}

/// Stored bot subscription record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredSubscription {
    pub id: String,
    pub user_id: String,
    pub bot_type: String,
    pub profit_percentage: String,
    pub status: String,
    pub is_active: bool,
    pub inactive_reason: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub payment_proof_url: Option<String>,
    pub admin_note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredSubscription {
    pub fn into_subscription(self) -> CoreResult<BotSubscription> {
        let bot_type =
            BotType::parse(&self.bot_type).ok_or_else(|| bad("bot type", &self.bot_type))?;
        let status = SubscriptionStatus::parse(&self.status)
            .ok_or_else(|| bad("subscription status", &self.status))?;
        let inactive_reason = match self.inactive_reason.as_deref() {
            Some(raw) => Some(InactiveReason::parse(raw).ok_or_else(|| bad("inactive reason", raw))?),
            None => None,
        };

        Ok(BotSubscription {
            profit_percentage: parse_decimal(&self.profit_percentage)?,
            start_date: parse_ts(&self.start_date)?,
            end_date: parse_ts(&self.end_date)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            bot_type,
            status,
            inactive_reason,
            id: self.id,
            user_id: self.user_id,
            is_active: self.is_active,
            payment_proof_url: self.payment_proof_url,
            admin_note: self.admin_note,
        })
    }
}

/// Stored payment-rail transaction.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTransaction {
    pub id: String,
    pub user_id: String,
    pub amount_minor: i64,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub status: String,
    pub payment_method_id: Option<String>,
    pub payment_method_type: String,
    pub transaction_reference: Option<String>,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredTransaction {
    pub fn into_transaction(self) -> CoreResult<Transaction> {
        let kind =
            TransactionType::parse(&self.kind).ok_or_else(|| bad("transaction type", &self.kind))?;
        let status = TransactionStatus::parse(&self.status)
            .ok_or_else(|| bad("transaction status", &self.status))?;
        let payment_method_type = PaymentMethodType::parse(&self.payment_method_type)
            .ok_or_else(|| bad("payment method type", &self.payment_method_type))?;

        Ok(Transaction {
            amount: from_minor(self.amount_minor),
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            kind,
            status,
            payment_method_type,
            id: self.id,
            user_id: self.user_id,
            payment_method_id: self.payment_method_id,
            transaction_reference: self.transaction_reference,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredPaymentMethod {
    pub id: String,
    pub user_id: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub account_number: String,
    pub account_title: String,
    pub bank_name: Option<String>,
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredPaymentMethod {
    pub fn into_method(self) -> CoreResult<PaymentMethod> {
        let kind = PaymentMethodType::parse(&self.kind)
            .ok_or_else(|| bad("payment method type", &self.kind))?;

        Ok(PaymentMethod {
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            kind,
            id: self.id,
            user_id: self.user_id,
            account_number: self.account_number,
            account_title: self.account_title,
            bank_name: self.bank_name,
            is_default: self.is_default,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredBankAccount {
    pub id: String,
    pub user_id: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredBankAccount {
    pub fn into_account(self) -> CoreResult<BankAccount> {
        Ok(BankAccount {
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            user_id: self.user_id,
            bank_name: self.bank_name,
            account_number: self.account_number,
            account_holder: self.account_holder,
            is_default: self.is_default,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredReferral {
    pub id: String,
    pub referrer_id: String,
    pub referred_user_id: String,
    pub total_trade_amount_minor: i64,
    pub reward_amount_minor: i64,
    pub is_reward_claimed: bool,
    pub created_at: String,
}

impl StoredReferral {
    pub fn into_referral(self) -> CoreResult<Referral> {
        Ok(Referral {
            created_at: parse_ts(&self.created_at)?,
            total_trade_amount: from_minor(self.total_trade_amount_minor),
            reward_amount: from_minor(self.reward_amount_minor),
            id: self.id,
            referrer_id: self.referrer_id,
            referred_user_id: self.referred_user_id,
            is_reward_claimed: self.is_reward_claimed,
        })
    }
}

/// Stored announcement.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredEvent {
    pub fn into_event(self) -> CoreResult<Event> {
        Ok(Event {
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            title: self.title,
            description: self.description,
            is_active: self.is_active,
        })
    }
}

/// Convert a batch of rows, failing on the first malformed one.
pub(crate) fn convert_all<R, T>(
    rows: Vec<R>,
    convert: impl Fn(R) -> CoreResult<T>,
) -> CoreResult<Vec<T>> {
    rows.into_iter().map(convert).collect()
}
