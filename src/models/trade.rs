//! Trade model: a time-boxed capital allocation earning a fixed profit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::subscription::BotType;

/// Lifecycle state of a trade. `Active -> Completed` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Active,
    Completed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Active => "active",
            TradeStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TradeStatus::Active),
            "completed" => Some(TradeStatus::Completed),
            _ => None,
        }
    }
}

/// Trade record owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,

    /// Owning user id
    pub user_id: String,

    /// Principal in PKR, debited at start and returned at completion
    pub amount: Decimal,

    /// Profit rate in percent (10..=15)
    pub profit_percentage: Decimal,

    /// Profit credited on completion
    pub profit_amount: Decimal,

    pub start_date: DateTime<Utc>,

    /// Start plus one month, or the completion instant when closed manually
    pub end_date: DateTime<Utc>,

    pub status: TradeStatus,

    /// Whether the trade was opened under a bot subscription
    pub is_bot: bool,

    pub bot_type: Option<BotType>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trade {
    /// Profit earned on `amount` at `pct` percent.
    pub fn profit_for(amount: Decimal, pct: Decimal) -> Decimal {
        (amount * pct / dec!(100)).round_dp(2)
    }

    /// Amount credited back to the owner when the trade closes.
    pub fn payout(&self) -> Decimal {
        self.amount + self.profit_amount
    }

    pub fn is_active(&self) -> bool {
        self.status == TradeStatus::Active
    }

    /// True once the term has run out and the sweep should close it.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.end_date <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_trade(amount: Decimal, pct: Decimal, ends_in_hours: i64) -> Trade {
        let now = Utc::now();
        Trade {
            id: "t-1".to_string(),
            user_id: "u-1".to_string(),
            amount,
            profit_percentage: pct,
            profit_amount: Trade::profit_for(amount, pct),
            start_date: now,
            end_date: now + Duration::hours(ends_in_hours),
            status: TradeStatus::Active,
            is_bot: false,
            bot_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_profit_for_default_rate() {
        assert_eq!(Trade::profit_for(dec!(5000), dec!(10)), dec!(500));
        assert_eq!(Trade::profit_for(dec!(12345), dec!(14)), dec!(1728.30));
    }

    #[test]
    fn test_payout_includes_principal() {
        let trade = make_trade(dec!(20000), dec!(15), 24);
        assert_eq!(trade.payout(), dec!(23000));
    }

    #[test]
    fn test_due_only_when_expired_and_active() {
        let mut trade = make_trade(dec!(5000), dec!(10), -1);
        assert!(trade.is_due(Utc::now()));

        trade.status = TradeStatus::Completed;
        assert!(!trade.is_due(Utc::now()));

        let fresh = make_trade(dec!(5000), dec!(10), 24);
        assert!(!fresh.is_due(Utc::now()));
    }

    #[test]
    fn test_status_round_trip_strings() {
        assert_eq!(TradeStatus::parse("active"), Some(TradeStatus::Active));
        assert_eq!(TradeStatus::Completed.as_str(), "completed");
        assert_eq!(TradeStatus::parse("cancelled"), None);
    }
}
