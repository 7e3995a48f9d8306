//! Payee descriptors: payment methods on the three rails and bank accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodType {
    Bank,
    Easypaisa,
    #[serde(rename = "jazzcash")]
    JazzCash,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Bank => "bank",
            PaymentMethodType::Easypaisa => "easypaisa",
            PaymentMethodType::JazzCash => "jazzcash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bank" => Some(PaymentMethodType::Bank),
            "easypaisa" => Some(PaymentMethodType::Easypaisa),
            "jazzcash" => Some(PaymentMethodType::JazzCash),
            _ => None,
        }
    }

    pub fn is_mobile_wallet(&self) -> bool {
        matches!(self, PaymentMethodType::Easypaisa | PaymentMethodType::JazzCash)
    }

    /// Mobile-wallet deposits must carry the transfer reference number.
    pub fn requires_reference(&self) -> bool {
        self.is_mobile_wallet()
    }

    /// Render an account number for display.
    pub fn mask(&self, account_number: &str) -> String {
        match self {
            PaymentMethodType::Bank => mask_tail(account_number),
            _ => {
                let head: String = account_number.chars().take(4).collect();
                format!("{}******", head)
            }
        }
    }

    /// Validate an account number for this rail.
    pub fn validate_account(&self, account_number: &str) -> Result<(), String> {
        if account_number.trim().is_empty() {
            return Err("Account number is required".to_string());
        }
        if self.is_mobile_wallet() && !is_pk_mobile(account_number) {
            return Err("Invalid mobile number format. Use format: 03XXXXXXXXX".to_string());
        }
        Ok(())
    }
}

/// Keep the last four characters, pad the rest with `*` to the original length.
pub fn mask_tail(account_number: &str) -> String {
    let chars: Vec<char> = account_number.chars().collect();
    let keep = chars.len().min(4);
    let hidden = chars.len() - keep;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

fn is_pk_mobile(number: &str) -> bool {
    number.len() == 11 && number.starts_with("03") && number.chars().all(|c| c.is_ascii_digit())
}

/// Stored payee on one of the payment rails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: PaymentMethodType,
    pub account_number: String,
    pub account_title: String,
    pub bank_name: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    pub fn masked(&self) -> MaskedPaymentMethod {
        MaskedPaymentMethod {
            id: self.id.clone(),
            kind: self.kind.as_str().to_string(),
            account_number: self.kind.mask(&self.account_number),
            account_title: self.account_title.clone(),
            bank_name: self.bank_name.clone(),
            is_default: self.is_default,
        }
    }
}

/// Display form of a payment method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedPaymentMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub account_number: String,
    pub account_title: String,
    pub bank_name: Option<String>,
    pub is_default: bool,
}

impl MaskedPaymentMethod {
    /// Placeholder shown for proof-based transactions without a payee.
    pub fn manual() -> Self {
        Self {
            id: "manual".to_string(),
            kind: "manual".to_string(),
            account_number: "N/A".to_string(),
            account_title: "Manual Deposit".to_string(),
            bank_name: Some("N/A".to_string()),
            is_default: false,
        }
    }
}

/// Bank account payee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: String,
    pub user_id: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BankAccount {
    pub fn masked(&self) -> MaskedBankAccount {
        MaskedBankAccount {
            id: self.id.clone(),
            bank_name: self.bank_name.clone(),
            account_number: mask_tail(&self.account_number),
            account_holder: self.account_holder.clone(),
            is_default: self.is_default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedBankAccount {
    pub id: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub is_default: bool,
}
