//! Ledger entities: users, trades, bot subscriptions, transactions, payees,
//! plus the announcements board.

mod event;
mod payee;
mod referral;
mod subscription;
mod trade;
mod transaction;
mod user;

pub use event::Event;
pub use payee::{
    mask_tail, BankAccount, MaskedBankAccount, MaskedPaymentMethod, PaymentMethod,
    PaymentMethodType,
};
pub use referral::{Referral, REWARD_THRESHOLD};
pub use subscription::{
    BotPlan, BotSubscription, BotType, InactiveReason, ReviewAction, SubscriptionStatus,
};
pub use trade::{Trade, TradeStatus};
pub use transaction::{
    credits_balance, Transaction, TransactionStatus, TransactionType, TransactionView,
};
pub use user::{generate_referral_code, User, UserProfile, UserSummary};
