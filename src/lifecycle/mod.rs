//! Lifecycle managers for the ledger entities.
//!
//! Each manager owns one entity's state machine and is the only code that
//! drives its transitions. Transitions that move money run inside a single
//! store transaction together with the [`crate::ledger`] call.

pub mod accounts;
pub mod events;
pub mod payees;
pub mod subscriptions;
pub mod trades;
pub mod transactions;

pub use accounts::{
    AccountService, Dashboard, Mailer, MonthPerformance, ReferralSummary, Registration,
    TracingMailer, UserDetail,
};
pub use events::{EventBoard, EventUpdate, NewEvent};
pub use payees::{
    BankAccountUpdate, NewBankAccount, NewPaymentMethod, PayeeBook, PaymentMethodUpdate,
};
pub use subscriptions::{SubscriptionManager, SubscriptionOverview, SubscriptionView};
pub use trades::{CompleteTrade, GraphPoint, StartTrade, TradeManager};
pub use transactions::{NewTransaction, PayeeRef, StatusChange, TransactionWorkflow};

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Requested page of a listing; 1-based.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, 100),
        }
    }

    fn normalized(self) -> Self {
        Self::new(self.page, self.limit)
    }

    fn limit(&self) -> i64 {
        i64::from(self.limit)
    }

    fn offset(&self) -> i64 {
        crate::db::offset(self.page, self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

impl Pagination {
    fn new(total: i64, request: PageRequest) -> Self {
        let limit = i64::from(request.limit);
        Self {
            total,
            page: request.page,
            limit: request.limit,
            pages: (total + limit - 1) / limit,
        }
    }
}

/// One page of results plus its position in the full listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Trimmed value, or `None` when absent or blank.
pub(crate) fn filled(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// End of a term of `months` calendar months starting at `start`.
pub(crate) fn term_end(start: DateTime<Utc>, months: u32) -> CoreResult<DateTime<Utc>> {
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("term end out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pagination_rounds_pages_up() {
        let p = Pagination::new(21, PageRequest::new(3, 10));
        assert_eq!(p.pages, 3);
        assert_eq!(Pagination::new(0, PageRequest::default()).pages, 0);
    }

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest::new(0, 1000);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 100);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_term_end_is_calendar_month() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let end = term_end(start, 1).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());
    }
}
