//! Referral relationship between two users.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Referrals needed before a reward can be claimed.
pub const REWARD_THRESHOLD: usize = 25;

/// Append-only link created when the referred user verifies their email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: String,
    pub referrer_id: String,
    pub referred_user_id: String,
    pub total_trade_amount: Decimal,
    pub reward_amount: Decimal,
    pub is_reward_claimed: bool,
    pub created_at: DateTime<Utc>,
}
