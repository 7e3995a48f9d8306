//! Payment methods and bank accounts owned by a user.
//!
//! Each user has at most one default payee per table. Setting a default
//! clears the siblings first; deleting the default promotes the oldest
//! remaining payee.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::filled;
use crate::db::{payees, Database, PayeeTable};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    BankAccount, MaskedBankAccount, MaskedPaymentMethod, PaymentMethod, PaymentMethodType,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaymentMethod {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub account_title: String,
    pub bank_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodUpdate {
    pub account_title: Option<String>,
    pub bank_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBankAccount {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountUpdate {
    pub bank_name: Option<String>,
    pub account_holder: Option<String>,
}

const METHOD_NOT_FOUND: &str = "Payment method not found or not owned by user";
const ACCOUNT_NOT_FOUND: &str = "Bank account not found or not owned by user";

#[derive(Clone)]
pub struct PayeeBook {
    db: Database,
}

impl PayeeBook {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ==================== Payment Methods ====================

    pub async fn add_payment_method(
        &self,
        user_id: &str,
        req: NewPaymentMethod,
    ) -> CoreResult<PaymentMethod> {
        let kind = PaymentMethodType::parse(req.kind.trim())
            .ok_or_else(|| CoreError::validation("Invalid payment method type"))?;
        let account_number = req.account_number.trim().to_string();
        kind.validate_account(&account_number)
            .map_err(CoreError::Validation)?;

        let bank_name = filled(req.bank_name);
        if kind == PaymentMethodType::Bank && bank_name.is_none() {
            return Err(CoreError::validation("Bank name is required for bank accounts"));
        }

        let now = Utc::now();
        let method = self
            .db
            .insert_payment_method(&PaymentMethod {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                kind,
                account_number,
                account_title: req.account_title.trim().to_string(),
                bank_name,
                is_default: false,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(
            user_id = %user_id,
            method_id = %method.id,
            kind = kind.as_str(),
            is_default = method.is_default,
            "Payment method added"
        );
        Ok(method)
    }

    pub async fn payment_methods(&self, user_id: &str) -> CoreResult<Vec<MaskedPaymentMethod>> {
        let methods = self.db.list_payment_methods(user_id).await?;
        Ok(methods.iter().map(PaymentMethod::masked).collect())
    }

    /// Full account numbers, for admin review.
    pub async fn payment_methods_unmasked(&self, user_id: &str) -> CoreResult<Vec<PaymentMethod>> {
        self.db.list_payment_methods(user_id).await
    }

    pub async fn update_payment_method(
        &self,
        user_id: &str,
        method_id: &str,
        req: PaymentMethodUpdate,
    ) -> CoreResult<PaymentMethod> {
        let title = filled(req.account_title);
        let bank_name = filled(req.bank_name);

        self.db
            .update_payment_method(
                method_id,
                user_id,
                title.as_deref(),
                bank_name.as_deref(),
                Utc::now(),
            )
            .await?
            .ok_or_else(|| CoreError::not_found(METHOD_NOT_FOUND))
    }

    pub async fn set_default_payment_method(&self, user_id: &str, method_id: &str) -> CoreResult<()> {
        self.set_default(PayeeTable::PaymentMethods, user_id, method_id, METHOD_NOT_FOUND)
            .await
    }

    pub async fn delete_payment_method(&self, user_id: &str, method_id: &str) -> CoreResult<()> {
        self.delete(PayeeTable::PaymentMethods, user_id, method_id, METHOD_NOT_FOUND)
            .await
    }

    // ==================== Bank Accounts ====================

    pub async fn add_bank_account(&self, user_id: &str, req: NewBankAccount) -> CoreResult<BankAccount> {
        let (Some(bank_name), Some(account_number), Some(account_holder)) = (
            filled(req.bank_name),
            filled(req.account_number),
            filled(req.account_holder),
        ) else {
            return Err(CoreError::validation(
                "Bank name, account number, and account holder are required",
            ));
        };

        let now = Utc::now();
        let account = self
            .db
            .insert_bank_account(&BankAccount {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                bank_name,
                account_number,
                account_holder,
                is_default: false,
                created_at: now,
                updated_at: now,
            })
            .await?
            .ok_or_else(|| {
                CoreError::validation("This bank account is already added to your profile")
            })?;

        info!(user_id = %user_id, account_id = %account.id, "Bank account added");
        Ok(account)
    }

    pub async fn bank_accounts(&self, user_id: &str) -> CoreResult<Vec<MaskedBankAccount>> {
        let accounts = self.db.list_bank_accounts(user_id).await?;
        Ok(accounts.iter().map(BankAccount::masked).collect())
    }

    pub async fn update_bank_account(
        &self,
        user_id: &str,
        account_id: &str,
        req: BankAccountUpdate,
    ) -> CoreResult<BankAccount> {
        let bank_name = filled(req.bank_name);
        let holder = filled(req.account_holder);

        self.db
            .update_bank_account(
                account_id,
                user_id,
                bank_name.as_deref(),
                holder.as_deref(),
                Utc::now(),
            )
            .await?
            .ok_or_else(|| CoreError::not_found(ACCOUNT_NOT_FOUND))
    }

    pub async fn set_default_bank_account(&self, user_id: &str, account_id: &str) -> CoreResult<()> {
        self.set_default(PayeeTable::BankAccounts, user_id, account_id, ACCOUNT_NOT_FOUND)
            .await
    }

    pub async fn delete_bank_account(&self, user_id: &str, account_id: &str) -> CoreResult<()> {
        self.delete(PayeeTable::BankAccounts, user_id, account_id, ACCOUNT_NOT_FOUND)
            .await
    }

    async fn set_default(
        &self,
        table: PayeeTable,
        user_id: &str,
        id: &str,
        missing: &'static str,
    ) -> CoreResult<()> {
        let mut tx = self.db.begin().await?;
        if !payees::set_default(&mut tx, table, id, user_id, Utc::now()).await? {
            tx.rollback().await?;
            return Err(CoreError::not_found(missing));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(
        &self,
        table: PayeeTable,
        user_id: &str,
        id: &str,
        missing: &'static str,
    ) -> CoreResult<()> {
        let mut tx = self.db.begin().await?;
        if !payees::delete_payee(&mut tx, table, id, user_id, Utc::now()).await? {
            tx.rollback().await?;
            return Err(CoreError::not_found(missing));
        }
        tx.commit().await?;

        info!(user_id = %user_id, payee_id = %id, ?table, "Payee deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::seed_user;
    use rust_decimal_macros::dec;

    fn bank(number: &str) -> NewBankAccount {
        NewBankAccount {
            bank_name: Some("Meezan".to_string()),
            account_number: Some(number.to_string()),
            account_holder: Some("Sara".to_string()),
        }
    }

    fn defaults(accounts: &[MaskedBankAccount]) -> usize {
        accounts.iter().filter(|a| a.is_default).count()
    }

    #[tokio::test]
    async fn test_new_default_clears_siblings() {
        let db = Database::in_memory().await.unwrap();
        let user = seed_user(&db, "payee@example.com", dec!(0)).await;
        let book = PayeeBook::new(db);

        let first = book.add_bank_account(&user.id, bank("1111222233")).await.unwrap();
        let second = book.add_bank_account(&user.id, bank("4444555566")).await.unwrap();
        let third = book.add_bank_account(&user.id, bank("7777888899")).await.unwrap();
        assert!(first.is_default);
        assert!(!second.is_default);
        assert!(!third.is_default);

        book.set_default_bank_account(&user.id, &third.id).await.unwrap();

        let accounts = book.bank_accounts(&user.id).await.unwrap();
        assert_eq!(defaults(&accounts), 1);
        let default = accounts.iter().find(|a| a.is_default).unwrap();
        assert_eq!(default.id, third.id);
        assert_eq!(default.account_number, "******8899");
    }

    #[tokio::test]
    async fn test_deleting_default_promotes_another() {
        let db = Database::in_memory().await.unwrap();
        let user = seed_user(&db, "promote@example.com", dec!(0)).await;
        let book = PayeeBook::new(db);

        let first = book.add_bank_account(&user.id, bank("1111222233")).await.unwrap();
        let second = book.add_bank_account(&user.id, bank("4444555566")).await.unwrap();

        book.delete_bank_account(&user.id, &first.id).await.unwrap();

        let accounts = book.bank_accounts(&user.id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, second.id);
        assert!(accounts[0].is_default);
    }

    #[tokio::test]
    async fn test_duplicate_and_foreign_bank_accounts() {
        let db = Database::in_memory().await.unwrap();
        let owner = seed_user(&db, "owner@example.com", dec!(0)).await;
        let other = seed_user(&db, "other@example.com", dec!(0)).await;
        let book = PayeeBook::new(db);

        let account = book.add_bank_account(&owner.id, bank("1111222233")).await.unwrap();
        let err = book
            .add_bank_account(&owner.id, bank("1111222233"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "This bank account is already added to your profile");

        // Same number is fine for a different user
        assert!(book.add_bank_account(&other.id, bank("1111222233")).await.is_ok());

        assert!(matches!(
            book.set_default_bank_account(&other.id, &account.id).await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            book.delete_bank_account(&other.id, &account.id).await,
            Err(CoreError::NotFound(_))
        ));

        let err = book
            .add_bank_account(&owner.id, NewBankAccount::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_payment_method_validation_and_masking() {
        let db = Database::in_memory().await.unwrap();
        let user = seed_user(&db, "pm@example.com", dec!(0)).await;
        let book = PayeeBook::new(db);

        let bad_type = book
            .add_payment_method(
                &user.id,
                NewPaymentMethod {
                    kind: "paypal".to_string(),
                    account_number: "x".to_string(),
                    account_title: "x".to_string(),
                    bank_name: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(bad_type.to_string(), "Invalid payment method type");

        let bad_number = book
            .add_payment_method(
                &user.id,
                NewPaymentMethod {
                    kind: "easypaisa".to_string(),
                    account_number: "12345".to_string(),
                    account_title: "Sara".to_string(),
                    bank_name: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(bad_number, CoreError::Validation(_)));

        let no_bank = book
            .add_payment_method(
                &user.id,
                NewPaymentMethod {
                    kind: "bank".to_string(),
                    account_number: "PK001234".to_string(),
                    account_title: "Sara".to_string(),
                    bank_name: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(no_bank.to_string(), "Bank name is required for bank accounts");

        let wallet = book
            .add_payment_method(
                &user.id,
                NewPaymentMethod {
                    kind: "easypaisa".to_string(),
                    account_number: "03451234567".to_string(),
                    account_title: "Sara".to_string(),
                    bank_name: None,
                },
            )
            .await
            .unwrap();
        assert!(wallet.is_default);

        let bank = book
            .add_payment_method(
                &user.id,
                NewPaymentMethod {
                    kind: "bank".to_string(),
                    account_number: "PK001234".to_string(),
                    account_title: "Sara".to_string(),
                    bank_name: Some("HBL".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(!bank.is_default);

        let masked = book.payment_methods(&user.id).await.unwrap();
        assert_eq!(masked[0].account_number, "0345******");
        assert_eq!(masked[1].account_number, "****1234");

        let full = book.payment_methods_unmasked(&user.id).await.unwrap();
        assert_eq!(full[1].account_number, "PK001234");
    }

    #[tokio::test]
    async fn test_payment_method_update_and_default() {
        let db = Database::in_memory().await.unwrap();
        let user = seed_user(&db, "upd@example.com", dec!(0)).await;
        let book = PayeeBook::new(db);

        let wallet = book
            .add_payment_method(
                &user.id,
                NewPaymentMethod {
                    kind: "jazzcash".to_string(),
                    account_number: "03001234567".to_string(),
                    account_title: "Old".to_string(),
                    bank_name: None,
                },
            )
            .await
            .unwrap();
        let bank = book
            .add_payment_method(
                &user.id,
                NewPaymentMethod {
                    kind: "bank".to_string(),
                    account_number: "0011223344".to_string(),
                    account_title: "Old".to_string(),
                    bank_name: Some("UBL".to_string()),
                },
            )
            .await
            .unwrap();

        // Bank name is ignored on mobile wallets
        let updated = book
            .update_payment_method(
                &user.id,
                &wallet.id,
                PaymentMethodUpdate {
                    account_title: Some("New".to_string()),
                    bank_name: Some("Ignored".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.account_title, "New");
        assert_eq!(updated.bank_name, None);

        let updated = book
            .update_payment_method(
                &user.id,
                &bank.id,
                PaymentMethodUpdate {
                    account_title: None,
                    bank_name: Some("MCB".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.account_title, "Old");
        assert_eq!(updated.bank_name.as_deref(), Some("MCB"));

        book.set_default_payment_method(&user.id, &bank.id).await.unwrap();
        let methods = book.payment_methods(&user.id).await.unwrap();
        assert_eq!(methods.iter().filter(|m| m.is_default).count(), 1);
        assert!(methods.iter().any(|m| m.id == bank.id && m.is_default));

        book.delete_payment_method(&user.id, &bank.id).await.unwrap();
        let methods = book.payment_methods(&user.id).await.unwrap();
        assert_eq!(methods.len(), 1);
        assert!(methods[0].is_default);
    }
}
