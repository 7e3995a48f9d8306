//! Trade lifecycle: `active -> completed`, exactly once.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{term_end, Page, PageRequest, Pagination};
use crate::config::TradeRules;
use crate::db::{subscriptions, trades, Database};
use crate::error::{CoreError, CoreResult};
use crate::ledger::{self, DebitPurpose};
use crate::models::{Trade, TradeStatus};

/// Request to open a trade.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTrade {
    pub amount: Decimal,
    #[serde(default)]
    pub is_bot: bool,
}

/// Caller-supplied terms for a manual completion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTrade {
    pub profit: Option<Decimal>,
    pub profit_percentage: Option<Decimal>,
}

/// Point on the synthetic performance chart.
#[derive(Debug, Clone, Serialize)]
pub struct GraphPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

/// Opens and closes trades, moving the principal and profit.
#[derive(Clone)]
pub struct TradeManager {
    db: Database,
    rules: TradeRules,
}

impl TradeManager {
    pub fn new(db: Database, rules: TradeRules) -> Self {
        Self { db, rules }
    }

    /// Open a trade, debiting the stake.
    ///
    /// Bot trades take the rate of the caller's entitled subscription; all
    /// others get the default rate.
    pub async fn start(&self, user_id: &str, req: StartTrade) -> CoreResult<Trade> {
        if !self.rules.amount_in_range(req.amount) {
            return Err(CoreError::validation(format!(
                "Trade amount must be between {} PKR",
                self.rules.amount_band_label()
            )));
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        ledger::debit(&mut tx, user_id, req.amount, DebitPurpose::TradeStake, now).await?;

        let (profit_percentage, bot_type) = if req.is_bot {
            let sub = subscriptions::find_entitled(&mut tx, user_id, now)
                .await?
                .ok_or_else(|| CoreError::forbidden("You do not have an active bot subscription"))?;
            (sub.profit_percentage, Some(sub.bot_type))
        } else {
            (self.rules.default_profit_pct, None)
        };

        let trade = Trade {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: req.amount,
            profit_percentage,
            profit_amount: Trade::profit_for(req.amount, profit_percentage),
            start_date: now,
            end_date: term_end(now, self.rules.term_months)?,
            status: TradeStatus::Active,
            is_bot: req.is_bot,
            bot_type,
            created_at: now,
            updated_at: now,
        };

        trades::insert_trade(&mut tx, &trade).await?;
        tx.commit().await?;

        info!(
            trade_id = %trade.id,
            user_id = %user_id,
            amount = %trade.amount,
            profit_pct = %trade.profit_percentage,
            is_bot = trade.is_bot,
            "Trade started"
        );

        Ok(trade)
    }

    /// Close an owner's active trade now and pay out principal plus profit.
    ///
    /// A second completion of the same trade fails with not-found.
    pub async fn complete(
        &self,
        user_id: &str,
        trade_id: &str,
        req: CompleteTrade,
    ) -> CoreResult<Trade> {
        let (profit_percentage, profit) = if self.rules.trust_client_profit {
            (req.profit_percentage, req.profit)
        } else {
            (None, None)
        };

        if let Some(profit) = profit {
            if profit < Decimal::ZERO {
                return Err(CoreError::validation("Profit must not be negative"));
            }
            let stored = self
                .db
                .get_trade_for_user(trade_id, user_id)
                .await?
                .filter(Trade::is_active)
                .ok_or_else(|| CoreError::not_found("Trade not found or not active"))?;
            let cap = Trade::profit_for(stored.amount, self.rules.max_profit_pct);
            if profit > cap {
                return Err(CoreError::validation(format!(
                    "Profit must not exceed {} PKR for this trade",
                    cap
                )));
            }
        }
        if let Some(pct) = profit_percentage {
            if !self.rules.profit_pct_in_range(pct) {
                return Err(CoreError::validation(format!(
                    "Profit percentage must be between {} and {}",
                    self.rules.min_profit_pct, self.rules.max_profit_pct
                )));
            }
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let trade = trades::close_trade(&mut tx, trade_id, user_id, profit_percentage, profit, now)
            .await?
            .ok_or_else(|| CoreError::not_found("Trade not found or not active"))?;

        ledger::credit(&mut tx, user_id, trade.payout(), trade.profit_amount, now).await?;
        tx.commit().await?;

        info!(
            trade_id = %trade.id,
            user_id = %user_id,
            payout = %trade.payout(),
            profit = %trade.profit_amount,
            "Trade completed manually"
        );

        Ok(trade)
    }

    /// Close a trade whose term has run out, crediting its stored profit.
    ///
    /// Returns `None` if the trade was already completed or is not yet due,
    /// which makes repeated sweeps harmless.
    pub async fn complete_expired(
        &self,
        trade_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<Trade>> {
        let mut tx = self.db.begin().await?;

        let Some(trade) = trades::close_due_trade(&mut tx, trade_id, now).await? else {
            return Ok(None);
        };

        ledger::credit(&mut tx, &trade.user_id, trade.payout(), trade.profit_amount, now).await?;
        tx.commit().await?;

        info!(
            trade_id = %trade.id,
            user_id = %trade.user_id,
            payout = %trade.payout(),
            "Expired trade completed"
        );

        Ok(Some(trade))
    }

    pub async fn list(
        &self,
        user_id: &str,
        status: Option<TradeStatus>,
        is_bot: Option<bool>,
        page: PageRequest,
    ) -> CoreResult<Page<Trade>> {
        let page = page.normalized();
        let (items, total) = self
            .db
            .list_trades(user_id, status, is_bot, page.limit(), page.offset())
            .await?;

        Ok(Page {
            items,
            pagination: Pagination::new(total, page),
        })
    }

    pub async fn get(&self, user_id: &str, trade_id: &str) -> CoreResult<Trade> {
        self.db
            .get_trade_for_user(trade_id, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Trade not found or not owned by user"))
    }

    /// Thirty daily points of a random walk for the trading chart.
    pub fn graph_data(&self, now: DateTime<Utc>) -> Vec<GraphPoint> {
        random_walk(&mut rand::thread_rng(), now, 30)
    }
}

fn random_walk<R: Rng>(rng: &mut R, now: DateTime<Utc>, points: i64) -> Vec<GraphPoint> {
    let mut value: f64 = rng.gen_range(5000.0..6000.0);

    (0..points)
        .map(|i| {
            value += value * rng.gen_range(-0.02..0.02);
            value = value.max(100.0);

            GraphPoint {
                timestamp: now - Duration::days(points - i),
                value: Decimal::from_f64(value).unwrap_or(Decimal::ONE_HUNDRED).round_dp(2),
            }
        })
        .collect()
}
