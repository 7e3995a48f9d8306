pub mod auth;
pub mod bots;
pub mod events;
pub mod payees;
pub mod trades;
pub mod transactions;
pub mod users;
