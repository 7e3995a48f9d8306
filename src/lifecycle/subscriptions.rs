//! Bot subscription lifecycle.
//!
//! Workflow: `pending -> {active, rejected}`, `active -> {expired, cancelled}`.
//! Entitlement (`is_active`) is tracked separately and held by at most one
//! subscription per user; activating one supersedes the others.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::term_end;
use crate::config::TradeRules;
use crate::db::{subscriptions, Database};
use crate::error::{CoreError, CoreResult};
use crate::ledger::{self, DebitPurpose};
use crate::models::{
    BotSubscription, BotType, InactiveReason, ReviewAction, SubscriptionStatus, UserSummary,
};

/// What the caller currently holds.
#[derive(Debug, Clone)]
pub enum SubscriptionOverview {
    Active {
        subscription: BotSubscription,
        remaining_days: i64,
    },
    Pending {
        bot_type: BotType,
        requested_at: DateTime<Utc>,
    },
    None,
}

/// Subscription joined with its owner for the review queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: BotSubscription,
    pub user: Option<UserSummary>,
}

#[derive(Clone)]
pub struct SubscriptionManager {
    db: Database,
    rules: TradeRules,
}

impl SubscriptionManager {
    pub fn new(db: Database, rules: TradeRules) -> Self {
        Self { db, rules }
    }

    pub fn plans(&self) -> Vec<crate::models::BotPlan> {
        BotType::catalog()
    }

    /// Resolve a plan id from a request body.
    pub fn parse_plan(plan_id: &str) -> CoreResult<BotType> {
        BotType::parse(plan_id).ok_or_else(|| CoreError::validation("Invalid bot plan selected"))
    }

    /// File a pending request backed by an out-of-band payment proof.
    pub async fn request(
        &self,
        user_id: &str,
        bot_type: BotType,
        payment_proof_url: Option<String>,
    ) -> CoreResult<BotSubscription> {
        let proof = payment_proof_url
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CoreError::validation("Payment proof is required"))?;

        let now = Utc::now();
        let sub = BotSubscription {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            bot_type,
            profit_percentage: bot_type.profit_percentage(),
            status: SubscriptionStatus::Pending,
            is_active: false,
            inactive_reason: None,
            start_date: now,
            end_date: term_end(now, self.rules.term_months)?,
            payment_proof_url: Some(proof),
            admin_note: None,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.db.pool().acquire().await?;
        if !subscriptions::insert_subscription(&mut conn, &sub).await? {
            return Err(CoreError::conflict(
                "You already have a pending request for this bot plan",
            ));
        }

        info!(
            subscription_id = %sub.id,
            user_id = %user_id,
            bot_type = bot_type.as_str(),
            "Bot subscription requested"
        );

        Ok(sub)
    }

    /// Buy a plan from the balance; it becomes the caller's entitlement at once.
    pub async fn purchase(&self, user_id: &str, bot_type: BotType) -> CoreResult<BotSubscription> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        ledger::debit(&mut tx, user_id, bot_type.price(), DebitPurpose::BotPlan, now).await?;
        let superseded =
            subscriptions::deactivate_all(&mut tx, user_id, InactiveReason::Superseded, now)
                .await?;

        let sub = BotSubscription {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            bot_type,
            profit_percentage: bot_type.profit_percentage(),
            status: SubscriptionStatus::Active,
            is_active: true,
            inactive_reason: None,
            start_date: now,
            end_date: term_end(now, self.rules.term_months)?,
            payment_proof_url: None,
            admin_note: None,
            created_at: now,
            updated_at: now,
        };

        if !subscriptions::insert_subscription(&mut tx, &sub).await? {
            return Err(CoreError::conflict("Another subscription is already active"));
        }
        tx.commit().await?;

        info!(
            subscription_id = %sub.id,
            user_id = %user_id,
            bot_type = bot_type.as_str(),
            price = %bot_type.price(),
            superseded,
            "Bot plan purchased"
        );

        Ok(sub)
    }

    /// Admin decision on a pending request. Approval is free of charge since
    /// payment happened outside the platform.
    pub async fn review(
        &self,
        subscription_id: &str,
        action: ReviewAction,
        admin_note: Option<&str>,
    ) -> CoreResult<BotSubscription> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let reviewed = match action {
            ReviewAction::Approve => {
                subscriptions::supersede_for_pending(&mut tx, subscription_id, now).await?;
                let end = term_end(now, self.rules.term_months)?;
                subscriptions::activate_pending(&mut tx, subscription_id, admin_note, now, end)
                    .await?
            }
            ReviewAction::Reject => {
                subscriptions::reject_pending(&mut tx, subscription_id, admin_note, now).await?
            }
        };

        let Some(sub) = reviewed else {
            tx.rollback().await?;
            return Err(match self.db.get_subscription(subscription_id).await? {
                None => CoreError::not_found("Bot subscription request not found"),
                Some(_) => CoreError::validation(format!(
                    "Cannot {} subscription that is not in pending status",
                    action.as_str()
                )),
            });
        };

        tx.commit().await?;

        info!(
            subscription_id = %sub.id,
            user_id = %sub.user_id,
            action = action.as_str(),
            "Bot subscription reviewed"
        );

        Ok(sub)
    }

    /// Cancel the caller's entitled subscription.
    pub async fn cancel(&self, user_id: &str) -> CoreResult<BotSubscription> {
        let mut conn = self.db.pool().acquire().await?;
        let sub = subscriptions::cancel_entitled(&mut conn, user_id, Utc::now())
            .await?
            .ok_or_else(|| CoreError::not_found("No active bot subscription found"))?;

        info!(subscription_id = %sub.id, user_id = %user_id, "Bot subscription cancelled");
        Ok(sub)
    }

    /// Drop the entitlement of a subscription past its end date.
    ///
    /// Returns `None` if it was already inactive or is not yet due.
    pub async fn expire(
        &self,
        subscription_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<BotSubscription>> {
        let mut conn = self.db.pool().acquire().await?;
        let expired = subscriptions::expire_due(&mut conn, subscription_id, now).await?;

        if let Some(sub) = &expired {
            info!(subscription_id = %sub.id, user_id = %sub.user_id, "Bot subscription expired");
        }
        Ok(expired)
    }

    pub async fn overview(&self, user_id: &str, now: DateTime<Utc>) -> CoreResult<SubscriptionOverview> {
        if let Some(sub) = self.db.entitled_subscription(user_id, now).await? {
            if sub.status == SubscriptionStatus::Active {
                return Ok(SubscriptionOverview::Active {
                    remaining_days: sub.remaining_days(now),
                    subscription: sub,
                });
            }
        }

        if let Some(pending) = self.db.latest_pending_subscription(user_id).await? {
            return Ok(SubscriptionOverview::Pending {
                bot_type: pending.bot_type,
                requested_at: pending.created_at,
            });
        }

        Ok(SubscriptionOverview::None)
    }

    /// Review queue, newest first, with owner details.
    pub async fn admin_list(
        &self,
        status: Option<SubscriptionStatus>,
    ) -> CoreResult<Vec<SubscriptionView>> {
        let subs = self.db.list_subscriptions(status).await?;

        let mut owners: HashMap<String, Option<UserSummary>> = HashMap::new();
        let mut views = Vec::with_capacity(subs.len());

        for sub in subs {
            if !owners.contains_key(&sub.user_id) {
                let owner = self.db.get_user(&sub.user_id).await?;
                owners.insert(sub.user_id.clone(), owner.as_ref().map(UserSummary::from));
            }
            let user = owners.get(&sub.user_id).cloned().flatten();
            views.push(SubscriptionView {
                subscription: sub,
                user,
            });
        }

        Ok(views)
    }
}
