//! Bot subscription model and the fixed plan catalog.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Bot plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotType {
    Basic,
    Advanced,
    Pro,
}

impl BotType {
    pub const ALL: [BotType; 3] = [BotType::Basic, BotType::Advanced, BotType::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            BotType::Basic => "basic",
            BotType::Advanced => "advanced",
            BotType::Pro => "pro",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(BotType::Basic),
            "advanced" => Some(BotType::Advanced),
            "pro" => Some(BotType::Pro),
            _ => None,
        }
    }

    /// Plan price in PKR.
    pub fn price(&self) -> Decimal {
        match self {
            BotType::Basic => dec!(5000),
            BotType::Advanced => dec!(10000),
            BotType::Pro => dec!(15000),
        }
    }

    /// Profit percentage conferred on bot trades.
    pub fn profit_percentage(&self) -> Decimal {
        match self {
            BotType::Basic => dec!(12),
            BotType::Advanced => dec!(14),
            BotType::Pro => dec!(15),
        }
    }

    pub fn plan(&self) -> BotPlan {
        let (name, description) = match self {
            BotType::Basic => (
                "Basic Bot",
                "Start with our basic bot and get 12% profit per trade",
            ),
            BotType::Advanced => (
                "Advanced Bot",
                "Get more profit with our advanced bot at 14% profit per trade",
            ),
            BotType::Pro => (
                "Pro Bot",
                "Maximize your profit with our pro bot at 15% profit per trade",
            ),
        };

        BotPlan {
            id: *self,
            name: name.to_string(),
            profit_percentage: self.profit_percentage(),
            duration: "1 Month".to_string(),
            price: self.price(),
            description: description.to_string(),
        }
    }

    /// Static plan catalog, cheapest first.
    pub fn catalog() -> Vec<BotPlan> {
        Self::ALL.iter().map(|t| t.plan()).collect()
    }
}

/// Public description of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotPlan {
    pub id: BotType,
    pub name: String,
    pub profit_percentage: Decimal,
    pub duration: String,
    pub price: Decimal,
    pub description: String,
}

/// Workflow outcome of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
    Rejected,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubscriptionStatus::Pending),
            "active" => Some(SubscriptionStatus::Active),
            "expired" => Some(SubscriptionStatus::Expired),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "rejected" => Some(SubscriptionStatus::Rejected),
            _ => None,
        }
    }
}

/// Why a subscription stopped conferring its profit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InactiveReason {
    Expired,
    Cancelled,
    /// Another subscription was activated for the same user
    Superseded,
}

impl InactiveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InactiveReason::Expired => "expired",
            InactiveReason::Cancelled => "cancelled",
            InactiveReason::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "expired" => Some(InactiveReason::Expired),
            "cancelled" => Some(InactiveReason::Cancelled),
            "superseded" => Some(InactiveReason::Superseded),
            _ => None,
        }
    }
}

/// Admin decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
        }
    }
}

/// Profit-rate entitlement owned by a user.
///
/// `status` records the workflow outcome while `is_active` records whether
/// the subscription currently confers its rate. At most one subscription per
/// user has `is_active = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSubscription {
    pub id: String,
    pub user_id: String,
    pub bot_type: BotType,
    pub profit_percentage: Decimal,
    pub status: SubscriptionStatus,
    pub is_active: bool,
    pub inactive_reason: Option<InactiveReason>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_proof_url: Option<String>,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BotSubscription {
    /// Whether bot trades opened now get this subscription's rate.
    pub fn confers_rate(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.end_date >= now
    }

    /// Whole days left in the term, rounded up.
    pub fn remaining_days(&self, now: DateTime<Utc>) -> i64 {
        let secs = (self.end_date - now).num_seconds();
        if secs <= 0 {
            return 0;
        }
        (secs + 86_399) / 86_400
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_plan_table() {
        assert_eq!(BotType::Basic.price(), dec!(5000));
        assert_eq!(BotType::Advanced.profit_percentage(), dec!(14));
        assert_eq!(BotType::Pro.price(), dec!(15000));
        assert_eq!(BotType::Pro.profit_percentage(), dec!(15));

        let catalog = BotType::catalog();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].id, BotType::Basic);
        assert_eq!(catalog[2].name, "Pro Bot");
    }

    #[test]
    fn test_remaining_days_rounds_up() {
        let now = Utc::now();
        let sub = BotSubscription {
            id: "s".into(),
            user_id: "u".into(),
            bot_type: BotType::Basic,
            profit_percentage: dec!(12),
            status: SubscriptionStatus::Active,
            is_active: true,
            inactive_reason: None,
            start_date: now,
            end_date: now + Duration::hours(25),
            payment_proof_url: None,
            admin_note: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(sub.remaining_days(now), 2);
        assert!(sub.confers_rate(now));
        assert!(!sub.confers_rate(now + Duration::hours(26)));
    }

    #[test]
    fn test_bot_type_serde_lowercase() {
        let json = serde_json::to_string(&BotType::Advanced).unwrap();
        assert_eq!(json, "\"advanced\"");
        let parsed: BotType = serde_json::from_str("\"pro\"").unwrap();
        assert_eq!(parsed, BotType::Pro);
    }
}
