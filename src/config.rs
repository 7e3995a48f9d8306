//! Service configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Numeric policy for trades and payment-rail transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRules {
    /// Minimum trade / transaction amount in PKR
    pub min_amount: Decimal,

    /// Maximum trade / transaction amount in PKR
    pub max_amount: Decimal,

    /// Profit percentage for trades started without a bot
    pub default_profit_pct: Decimal,

    /// Lowest profit percentage a trade may carry
    pub min_profit_pct: Decimal,

    /// Highest profit percentage a trade may carry
    pub max_profit_pct: Decimal,

    /// Trade and subscription term in calendar months
    pub term_months: u32,

    /// Accept caller-supplied profit values on manual completion
    pub trust_client_profit: bool,
}

impl Default for TradeRules {
    fn default() -> Self {
        Self {
            min_amount: dec!(5000),
            max_amount: dec!(50000),
            default_profit_pct: dec!(10),
            min_profit_pct: dec!(10),
            max_profit_pct: dec!(15),
            term_months: 1,
            trust_client_profit: true,
        }
    }
}

impl TradeRules {
    /// Check that an amount is inside the allowed band.
    pub fn amount_in_range(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }

    pub fn profit_pct_in_range(&self, pct: Decimal) -> bool {
        pct >= self.min_profit_pct && pct <= self.max_profit_pct
    }

    /// Human form of the amount band, e.g. `5,000 and 50,000`.
    pub fn amount_band_label(&self) -> String {
        format!(
            "{} and {}",
            group_thousands(self.min_amount),
            group_thousands(self.max_amount)
        )
    }
}

/// Format the integer part of an amount with `,` separators.
pub fn group_thousands(amount: Decimal) -> String {
    let digits = amount.trunc().abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if amount.is_sign_negative() && !amount.trunc().is_zero() {
        out.insert(0, '-');
    }
    out
}

/// Process-level configuration assembled from CLI flags and environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection URL
    pub database_url: String,

    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Expiry sweep period in seconds
    pub sweep_interval_secs: u64,

    /// Base URL used to build referral links
    pub frontend_url: String,

    pub rules: TradeRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./tradedesk.db?mode=rwc".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            sweep_interval_secs: 3600,
            frontend_url: "http://localhost:3000".to_string(),
            rules: TradeRules::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_band_is_inclusive() {
        let rules = TradeRules::default();
        assert!(rules.amount_in_range(dec!(5000)));
        assert!(rules.amount_in_range(dec!(50000)));
        assert!(!rules.amount_in_range(dec!(4999.99)));
        assert!(!rules.amount_in_range(dec!(50000.01)));
    }

    #[test]
    fn test_band_label() {
        assert_eq!(TradeRules::default().amount_band_label(), "5,000 and 50,000");
        assert_eq!(group_thousands(dec!(999)), "999");
        assert_eq!(group_thousands(dec!(1234567.89)), "1,234,567");
    }

    #[test]
    fn test_profit_band() {
        let rules = TradeRules::default();
        assert!(rules.profit_pct_in_range(dec!(12.5)));
        assert!(!rules.profit_pct_in_range(dec!(9)));
        assert!(!rules.profit_pct_in_range(dec!(16)));
    }
}
