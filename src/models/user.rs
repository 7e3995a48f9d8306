//! User model: identity plus wallet.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Registered user and their wallet figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    pub full_name: String,

    /// Unique, stored lowercase
    pub email: String,

    /// Hash produced by the external password hasher
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub is_verified: bool,

    pub is_admin: bool,

    #[serde(default)]
    pub profile_image: Option<String>,

    /// Spendable funds; never negative
    pub balance: Decimal,

    /// Cumulative realized profit
    pub total_profit: Decimal,

    pub referral_code: String,

    /// Id of the user whose code was used at registration
    pub referred_by: Option<String>,

    pub referral_count: i64,

    #[serde(skip_serializing, default)]
    pub reset_token: Option<String>,

    #[serde(skip_serializing, default)]
    pub reset_expires: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A reset token is usable until its expiry.
    pub fn reset_token_valid(&self, token: &str, now: DateTime<Utc>) -> bool {
        match (&self.reset_token, self.reset_expires) {
            (Some(stored), Some(expires)) => stored == token && expires > now,
            _ => false,
        }
    }
}

/// Public identity fields attached to admin listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub profile_image: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

/// The caller's own account as returned by `/auth/profile`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub profile_image: Option<String>,
    pub balance: Decimal,
    pub total_profit: Decimal,
    pub referral_code: String,
    pub referral_count: i64,
    pub is_admin: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            profile_image: user.profile_image.clone(),
            balance: user.balance,
            total_profit: user.total_profit,
            referral_code: user.referral_code.clone(),
            referral_count: user.referral_count,
            is_admin: user.is_admin,
        }
    }
}

/// Build a referral code: name prefix plus six random uppercase characters.
pub fn generate_referral_code(full_name: &str) -> String {
    let prefix: String = full_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("{}{}", prefix, random)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_referral_code_shape() {
        let code = generate_referral_code("ayesha khan");
        assert_eq!(code.len(), 9);
        assert!(code.starts_with("AYE"));
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_referral_suffix_uses_letters_past_hex() {
        let beyond_hex = (0..200)
            .map(|_| generate_referral_code("Bilal"))
            .inspect(|code| assert!(code.starts_with("BIL")))
            .flat_map(|code| code.chars().skip(3).collect::<Vec<_>>())
            .any(|c| ('G'..='Z').contains(&c));
        assert!(beyond_hex);
    }

    #[test]
    fn test_referral_code_short_name() {
        let code = generate_referral_code("Al");
        assert!(code.starts_with("AL"));
        assert_eq!(code.len(), 8);
    }

    #[test]
    fn test_reset_token_validity() {
        let now = Utc::now();
        let mut user = User {
            id: "u".into(),
            full_name: "Test".into(),
            email: "t@example.com".into(),
            password_hash: "x".into(),
            is_verified: true,
            is_admin: false,
            profile_image: None,
            balance: dec!(0),
            total_profit: dec!(0),
            referral_code: "TESABCDEF".into(),
            referred_by: None,
            referral_count: 0,
            reset_token: Some("tok".into()),
            reset_expires: Some(now + Duration::minutes(30)),
            created_at: now,
            updated_at: now,
        };
        assert!(user.reset_token_valid("tok", now));
        assert!(!user.reset_token_valid("other", now));

        user.reset_expires = Some(now - Duration::minutes(1));
        assert!(!user.reset_token_valid("tok", now));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: "u".into(),
            full_name: "Test".into(),
            email: "t@example.com".into(),
            password_hash: "secret-hash".into(),
            is_verified: true,
            is_admin: false,
            profile_image: None,
            balance: dec!(10),
            total_profit: dec!(0),
            referral_code: "TESABCDEF".into(),
            referred_by: None,
            referral_count: 0,
            reset_token: Some("tok".into()),
            reset_expires: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("tok\""));
    }
}
