//! Expiry sweep: closes trades and bot subscriptions whose term has ended.
//!
//! Runs on a fixed period as a task owned by whoever calls [`ExpirySweep::start`].
//! Each entity is closed through its lifecycle manager, so a record that was
//! already closed (by a user, or by an earlier pass) is skipped. A failure on
//! one record is logged and the pass moves on to the next.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::CoreResult;
use crate::lifecycle::{SubscriptionManager, TradeManager};

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub trades_due: usize,
    pub trades_completed: usize,
    pub subscriptions_due: usize,
    pub subscriptions_expired: usize,
    pub failures: usize,
}

#[derive(Clone)]
pub struct ExpirySweep {
    db: Database,
    trades: TradeManager,
    subscriptions: SubscriptionManager,
    period: Duration,
}

impl ExpirySweep {
    pub fn new(
        db: Database,
        trades: TradeManager,
        subscriptions: SubscriptionManager,
        period: Duration,
    ) -> Self {
        Self {
            db,
            trades,
            subscriptions,
            period,
        }
    }

    /// Run one pass over everything due at `now`.
    ///
    /// Only listing the candidates can fail; per-record errors are counted
    /// in the report.
    pub async fn run_once(&self, now: DateTime<Utc>) -> CoreResult<SweepReport> {
        let mut report = SweepReport::default();

        let trade_ids = self.db.due_trade_ids(now).await?;
        report.trades_due = trade_ids.len();
        info!(count = trade_ids.len(), "Expired trades to complete");

        for trade_id in trade_ids {
            match self.trades.complete_expired(&trade_id, now).await {
                Ok(Some(_)) => report.trades_completed += 1,
                Ok(None) => debug!(trade_id = %trade_id, "Trade already closed, skipping"),
                Err(e) => {
                    report.failures += 1;
                    warn!(trade_id = %trade_id, error = %e, "Failed to complete expired trade");
                }
            }
        }

        let subscription_ids = self.db.due_subscription_ids(now).await?;
        report.subscriptions_due = subscription_ids.len();
        info!(count = subscription_ids.len(), "Expired bot subscriptions to deactivate");

        for subscription_id in subscription_ids {
            match self.subscriptions.expire(&subscription_id, now).await {
                Ok(Some(_)) => report.subscriptions_expired += 1,
                Ok(None) => {
                    debug!(subscription_id = %subscription_id, "Subscription already inactive")
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(
                        subscription_id = %subscription_id,
                        error = %e,
                        "Failed to expire bot subscription"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Spawn the recurring task. The first pass runs immediately.
    pub fn start(self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(period_secs = self.period.as_secs(), "Starting expiry sweep");

            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_once(Utc::now()).await {
                            Ok(report) => info!(
                                trades_completed = report.trades_completed,
                                subscriptions_expired = report.subscriptions_expired,
                                failures = report.failures,
                                "Expiry sweep pass finished"
                            ),
                            Err(e) => error!(error = %e, "Expiry sweep pass failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Expiry sweep stopped");
        });

        SweepHandle { shutdown_tx, task }
    }
}

/// Owner's handle on a running sweep.
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the task and wait for the pass in progress to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Expiry sweep task ended abnormally");
        }
    }
}
