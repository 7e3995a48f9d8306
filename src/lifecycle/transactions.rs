//! Deposit and withdrawal workflow: `pending -> {completed, failed}`.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::{Page, PageRequest, Pagination};
use crate::config::TradeRules;
use crate::db::{transactions, Database, TransactionFilter};
use crate::error::{CoreError, CoreResult};
use crate::ledger;
use crate::models::{
    credits_balance, MaskedPaymentMethod, PaymentMethod, PaymentMethodType, Transaction,
    TransactionStatus, TransactionType, TransactionView, UserSummary,
};

/// Payee a transaction is routed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayeeRef {
    /// Proof-based transfer without a stored payment method
    Manual,
    Method(String),
}

impl PayeeRef {
    /// `"manual"` (or nothing) selects a manual transfer.
    pub fn from_request(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("manual") => PayeeRef::Manual,
            Some(id) => PayeeRef::Method(id.to_string()),
        }
    }
}

/// A deposit or withdrawal request.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub payee: PayeeRef,
    /// Transfer reference; for manual deposits, the payment screenshot URL
    pub transaction_reference: Option<String>,
}

/// Outcome of an admin status update.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub transaction: Transaction,
    pub previous: TransactionStatus,
    /// Whether this call credited the owner's balance
    pub credited: bool,
}

#[derive(Clone)]
pub struct TransactionWorkflow {
    db: Database,
    rules: TradeRules,
}

impl TransactionWorkflow {
    pub fn new(db: Database, rules: TradeRules) -> Self {
        Self { db, rules }
    }

    /// File a pending deposit. No balance change until an admin completes it.
    pub async fn deposit(&self, user_id: &str, req: NewTransaction) -> CoreResult<Transaction> {
        self.check_amount("Deposit", req.amount)?;
        let reference = non_empty(req.transaction_reference);

        let (method, method_type) = match &req.payee {
            PayeeRef::Manual => {
                if reference.is_none() {
                    return Err(CoreError::validation(
                        "Payment screenshot URL is required for manual deposits",
                    ));
                }
                (None, PaymentMethodType::Bank)
            }
            PayeeRef::Method(id) => {
                let method = self.owned_method(id, user_id).await?;
                if method.kind.requires_reference() && reference.is_none() {
                    return Err(CoreError::validation(format!(
                        "Transaction reference number is required for {} deposits",
                        method.kind.as_str()
                    )));
                }
                let kind = method.kind;
                (Some(method), kind)
            }
        };

        let via = method
            .as_ref()
            .map(|m| m.kind.as_str())
            .unwrap_or("manual transfer");
        let description = format!("Deposit of {} PKR via {}", req.amount, via);

        self.create(
            user_id,
            TransactionType::Deposit,
            req.amount,
            method.map(|m| m.id),
            method_type,
            reference,
            description,
        )
        .await
    }

    /// File a pending withdrawal. Completion does not touch the balance.
    pub async fn withdraw(&self, user_id: &str, req: NewTransaction) -> CoreResult<Transaction> {
        self.check_amount("Withdrawal", req.amount)?;

        let (method, method_type, description) = match &req.payee {
            PayeeRef::Manual => (
                None,
                PaymentMethodType::Bank,
                format!("Withdrawal of {} PKR", req.amount),
            ),
            PayeeRef::Method(id) => {
                let method = self.owned_method(id, user_id).await?;
                let description =
                    format!("Withdrawal of {} PKR via {}", req.amount, method.kind.as_str());
                let kind = method.kind;
                (Some(method), kind, description)
            }
        };

        self.create(
            user_id,
            TransactionType::Withdrawal,
            req.amount,
            method.map(|m| m.id),
            method_type,
            non_empty(req.transaction_reference),
            description,
        )
        .await
    }

    /// Admin transition out of `pending`.
    ///
    /// Completing a deposit credits its amount in the same store transaction.
    /// Repeating the current status is a no-op; leaving a terminal status is
    /// rejected.
    pub async fn update_status(
        &self,
        transaction_id: &str,
        next: TransactionStatus,
        admin_note: Option<&str>,
    ) -> CoreResult<StatusChange> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let resolved =
            transactions::resolve_pending(&mut tx, transaction_id, next, admin_note, now).await?;

        let Some(transaction) = resolved else {
            let current = transactions::find_transaction(&mut tx, transaction_id).await?;
            tx.rollback().await?;

            let transaction =
                current.ok_or_else(|| CoreError::not_found("Transaction not found"))?;
            if transaction.status == next {
                return Ok(StatusChange {
                    previous: transaction.status,
                    transaction,
                    credited: false,
                });
            }
            return Err(CoreError::validation(format!(
                "Cannot change status of a {} transaction",
                transaction.status.as_str()
            )));
        };

        let previous = TransactionStatus::Pending;
        let credited = credits_balance(transaction.kind, previous, next);
        if credited {
            ledger::credit(&mut tx, &transaction.user_id, transaction.amount, Decimal::ZERO, now)
                .await?;
        }
        tx.commit().await?;

        if transaction.kind == TransactionType::Withdrawal && next == TransactionStatus::Completed {
            info!(
                transaction_id = %transaction.id,
                user_id = %transaction.user_id,
                amount = %transaction.amount,
                "Withdrawal completed; balance unchanged"
            );
        } else {
            info!(
                transaction_id = %transaction.id,
                user_id = %transaction.user_id,
                status = next.as_str(),
                credited,
                "Transaction status updated"
            );
        }

        Ok(StatusChange {
            transaction,
            previous,
            credited,
        })
    }

    /// Own transactions, or everyone's for admins, newest first.
    pub async fn list(
        &self,
        caller_id: &str,
        is_admin: bool,
        kind: Option<TransactionType>,
        status: Option<TransactionStatus>,
        page: PageRequest,
    ) -> CoreResult<Page<TransactionView>> {
        let page = page.normalized();
        let filter = TransactionFilter {
            user_id: (!is_admin).then(|| caller_id.to_string()),
            kind,
            status,
        };

        let (rows, total) = self
            .db
            .list_transactions(&filter, page.limit(), page.offset())
            .await?;

        let mut owners: HashMap<String, Option<UserSummary>> = HashMap::new();
        let mut items = Vec::with_capacity(rows.len());
        for transaction in rows {
            if !owners.contains_key(&transaction.user_id) {
                let owner = self.db.get_user(&transaction.user_id).await?;
                owners.insert(
                    transaction.user_id.clone(),
                    owner.as_ref().map(UserSummary::from),
                );
            }
            let user = owners.get(&transaction.user_id).cloned().flatten();
            items.push(self.view(transaction, user).await?);
        }

        Ok(Page {
            items,
            pagination: Pagination::new(total, page),
        })
    }

    /// Single transaction; non-admins only see their own.
    pub async fn get(
        &self,
        caller_id: &str,
        is_admin: bool,
        transaction_id: &str,
    ) -> CoreResult<TransactionView> {
        let transaction = self
            .db
            .get_transaction(transaction_id)
            .await?
            .filter(|t| is_admin || t.user_id == caller_id)
            .ok_or_else(|| CoreError::not_found("Transaction not found or not owned by user"))?;

        self.view(transaction, None).await
    }

    async fn view(
        &self,
        t: Transaction,
        user: Option<UserSummary>,
    ) -> CoreResult<TransactionView> {
        let payment_method = match &t.payment_method_id {
            Some(id) => self
                .db
                .find_payment_method(id)
                .await?
                .map(|m| m.masked())
                .unwrap_or_else(MaskedPaymentMethod::manual),
            None => MaskedPaymentMethod::manual(),
        };

        Ok(TransactionView {
            id: t.id,
            user_id: t.user_id,
            amount: t.amount,
            kind: t.kind,
            status: t.status,
            payment_method,
            transaction_reference: t.transaction_reference,
            description: t.description,
            user,
            created_at: t.created_at,
            updated_at: t.updated_at,
        })
    }

    fn check_amount(&self, label: &str, amount: Decimal) -> CoreResult<()> {
        if self.rules.amount_in_range(amount) {
            return Ok(());
        }
        Err(CoreError::validation(format!(
            "{} amount must be between {} PKR",
            label,
            self.rules.amount_band_label()
        )))
    }

    async fn owned_method(&self, id: &str, user_id: &str) -> CoreResult<PaymentMethod> {
        self.db
            .get_payment_method(id, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Payment method not found or not owned by user"))
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        user_id: &str,
        kind: TransactionType,
        amount: Decimal,
        payment_method_id: Option<String>,
        payment_method_type: PaymentMethodType,
        transaction_reference: Option<String>,
        description: String,
    ) -> CoreResult<Transaction> {
        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            kind,
            status: TransactionStatus::Pending,
            payment_method_id,
            payment_method_type,
            transaction_reference,
            description,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.db.pool().acquire().await?;
        transactions::insert_transaction(&mut conn, &transaction).await?;

        info!(
            transaction_id = %transaction.id,
            user_id = %user_id,
            kind = kind.as_str(),
            amount = %amount,
            "Transaction requested"
        );

        Ok(transaction)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{seed_admin, seed_user};
    use crate::ledger::wallet;
    use crate::lifecycle::{NewPaymentMethod, PayeeBook};
    use rust_decimal_macros::dec;

    async fn setup() -> (Database, TransactionWorkflow) {
        let db = Database::in_memory().await.unwrap();
        let workflow = TransactionWorkflow::new(db.clone(), TradeRules::default());
        (db, workflow)
    }

    fn manual(amount: Decimal, proof: Option<&str>) -> NewTransaction {
        NewTransaction {
            amount,
            payee: PayeeRef::Manual,
            transaction_reference: proof.map(str::to_string),
        }
    }

    async fn add_wallet(db: &Database, user_id: &str) -> PaymentMethod {
        PayeeBook::new(db.clone())
            .add_payment_method(
                user_id,
                NewPaymentMethod {
                    kind: "jazzcash".to_string(),
                    account_number: "03001234567".to_string(),
                    account_title: "Ali".to_string(),
                    bank_name: None,
                },
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_payee_ref_parsing() {
        assert_eq!(PayeeRef::from_request(Some("manual")), PayeeRef::Manual);
        assert_eq!(PayeeRef::from_request(None), PayeeRef::Manual);
        assert_eq!(
            PayeeRef::from_request(Some("abc")),
            PayeeRef::Method("abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_deposit_credit_happens_once() {
        let (db, workflow) = setup().await;
        let user = seed_user(&db, "dep@example.com", dec!(0)).await;

        let deposit = workflow
            .deposit(&user.id, manual(dec!(7000), Some("https://cdn/proof.png")))
            .await
            .unwrap();
        assert_eq!(deposit.status, TransactionStatus::Pending);
        assert_eq!(deposit.description, "Deposit of 7000 PKR via manual transfer");

        let (balance, _) = wallet(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(balance, dec!(0));

        let first = workflow
            .update_status(&deposit.id, TransactionStatus::Completed, Some("verified"))
            .await
            .unwrap();
        assert!(first.credited);
        assert_eq!(
            first.transaction.description,
            "Deposit of 7000 PKR via manual transfer | Admin Note: verified"
        );

        let second = workflow
            .update_status(&deposit.id, TransactionStatus::Completed, None)
            .await
            .unwrap();
        assert!(!second.credited);
        assert_eq!(second.previous, TransactionStatus::Completed);

        let (balance, profit) = wallet(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(balance, dec!(7000));
        assert_eq!(profit, dec!(0));
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let (db, workflow) = setup().await;
        let user = seed_user(&db, "fail@example.com", dec!(0)).await;
        let deposit = workflow
            .deposit(&user.id, manual(dec!(5000), Some("proof")))
            .await
            .unwrap();

        workflow
            .update_status(&deposit.id, TransactionStatus::Failed, None)
            .await
            .unwrap();
        let err = workflow
            .update_status(&deposit.id, TransactionStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let (balance, _) = wallet(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(balance, dec!(0));

        assert!(matches!(
            workflow
                .update_status("missing", TransactionStatus::Completed, None)
                .await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_withdrawal_completion_leaves_balance() {
        let (db, workflow) = setup().await;
        let user = seed_user(&db, "wd@example.com", dec!(9000)).await;

        let withdrawal = workflow
            .withdraw(&user.id, manual(dec!(6000), None))
            .await
            .unwrap();
        assert_eq!(withdrawal.description, "Withdrawal of 6000 PKR");

        let change = workflow
            .update_status(&withdrawal.id, TransactionStatus::Completed, None)
            .await
            .unwrap();
        assert!(!change.credited);

        let (balance, _) = wallet(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(balance, dec!(9000));
    }

    #[tokio::test]
    async fn test_deposit_validation() {
        let (db, workflow) = setup().await;
        let user = seed_user(&db, "val@example.com", dec!(0)).await;
        let other = seed_user(&db, "other@example.com", dec!(0)).await;

        let err = workflow
            .deposit(&user.id, manual(dec!(4000), Some("proof")))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Deposit amount must be between 5,000 and 50,000 PKR"
        );

        let err = workflow
            .deposit(&user.id, manual(dec!(5000), None))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Payment screenshot URL is required for manual deposits"
        );

        let method = add_wallet(&db, &user.id).await;
        let via_wallet = |reference: Option<&str>| NewTransaction {
            amount: dec!(5000),
            payee: PayeeRef::Method(method.id.clone()),
            transaction_reference: reference.map(str::to_string),
        };

        let err = workflow.deposit(&user.id, via_wallet(None)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transaction reference number is required for jazzcash deposits"
        );

        let ok = workflow
            .deposit(&user.id, via_wallet(Some("TX123")))
            .await
            .unwrap();
        assert_eq!(ok.payment_method_type, PaymentMethodType::JazzCash);
        assert_eq!(ok.description, "Deposit of 5000 PKR via jazzcash");

        // Someone else's payment method
        let err = workflow
            .deposit(&other.id, via_wallet(Some("TX1")))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_listing_scopes_and_masks() {
        let (db, workflow) = setup().await;
        let admin = seed_admin(&db, "admin@example.com").await;
        let alice = seed_user(&db, "alice@example.com", dec!(0)).await;
        let bob = seed_user(&db, "bob@example.com", dec!(0)).await;

        let method = add_wallet(&db, &alice.id).await;
        workflow
            .deposit(
                &alice.id,
                NewTransaction {
                    amount: dec!(5000),
                    payee: PayeeRef::Method(method.id.clone()),
                    transaction_reference: Some("REF".to_string()),
                },
            )
            .await
            .unwrap();
        let bobs = workflow
            .withdraw(&bob.id, manual(dec!(5000), None))
            .await
            .unwrap();

        let mine = workflow
            .list(&alice.id, false, None, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(mine.pagination.total, 1);
        assert_eq!(mine.items[0].payment_method.account_number, "0300******");

        let all = workflow
            .list(&admin.id, true, None, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.pagination.total, 2);
        assert!(all.items.iter().all(|t| t.user.is_some()));

        let deposits = workflow
            .list(&admin.id, true, Some(TransactionType::Deposit), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(deposits.pagination.total, 1);

        let view = workflow.get(&bob.id, false, &bobs.id).await.unwrap();
        assert_eq!(view.payment_method.id, "manual");
        assert!(matches!(
            workflow.get(&alice.id, false, &bobs.id).await,
            Err(CoreError::NotFound(_))
        ));
        assert!(workflow.get(&admin.id, true, &bobs.id).await.is_ok());
    }
}
