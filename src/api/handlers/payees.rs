//! `/payments` and `/banks` endpoints.

use axum::extract::{Path, State};

use crate::api::extractors::{AdminCaller, ApiJson, VerifiedCaller};
use crate::api::types::{ApiResult, Reply};
use crate::api::AppState;
use crate::lifecycle::{
    BankAccountUpdate, NewBankAccount, NewPaymentMethod, PaymentMethodUpdate,
};
use crate::models::{MaskedBankAccount, MaskedPaymentMethod, PaymentMethod};

// ==================== Payment Methods ====================

pub async fn add_payment_method(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiJson(body): ApiJson<NewPaymentMethod>,
) -> ApiResult<MaskedPaymentMethod> {
    let method = state.payees.add_payment_method(&user.id, body).await?;
    Ok(Reply::created("Payment method added successfully", method.masked()))
}

pub async fn list_payment_methods(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
) -> ApiResult<Vec<MaskedPaymentMethod>> {
    Ok(Reply::ok(state.payees.payment_methods(&user.id).await?))
}

pub async fn update_payment_method(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    Path(method_id): Path<String>,
    ApiJson(body): ApiJson<PaymentMethodUpdate>,
) -> ApiResult<MaskedPaymentMethod> {
    let method = state
        .payees
        .update_payment_method(&user.id, &method_id, body)
        .await?;
    Ok(Reply::ok(method.masked()).with_message("Payment method updated successfully"))
}

pub async fn set_default_payment_method(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    Path(method_id): Path<String>,
) -> ApiResult {
    state
        .payees
        .set_default_payment_method(&user.id, &method_id)
        .await?;
    Ok(Reply::done("Default payment method updated successfully"))
}

pub async fn delete_payment_method(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    Path(method_id): Path<String>,
) -> ApiResult {
    state.payees.delete_payment_method(&user.id, &method_id).await?;
    Ok(Reply::done("Payment method deleted successfully"))
}

/// Full account numbers of another user's payment methods.
pub async fn user_payment_methods(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<PaymentMethod>> {
    Ok(Reply::ok(state.payees.payment_methods_unmasked(&user_id).await?))
}

// ==================== Bank Accounts ====================

pub async fn add_bank_account(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiJson(body): ApiJson<NewBankAccount>,
) -> ApiResult<MaskedBankAccount> {
    let account = state.payees.add_bank_account(&user.id, body).await?;
    Ok(Reply::created("Bank account added successfully", account.masked()))
}

pub async fn list_bank_accounts(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
) -> ApiResult<Vec<MaskedBankAccount>> {
    Ok(Reply::ok(state.payees.bank_accounts(&user.id).await?))
}

pub async fn update_bank_account(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    Path(account_id): Path<String>,
    ApiJson(body): ApiJson<BankAccountUpdate>,
) -> ApiResult<MaskedBankAccount> {
    let account = state
        .payees
        .update_bank_account(&user.id, &account_id, body)
        .await?;
    Ok(Reply::ok(account.masked()).with_message("Bank account updated successfully"))
}

pub async fn set_default_bank_account(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    Path(account_id): Path<String>,
) -> ApiResult {
    state
        .payees
        .set_default_bank_account(&user.id, &account_id)
        .await?;
    Ok(Reply::done("Default bank account updated successfully"))
}

pub async fn delete_bank_account(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    Path(account_id): Path<String>,
) -> ApiResult {
    state.payees.delete_bank_account(&user.id, &account_id).await?;
    Ok(Reply::done("Bank account deleted successfully"))
}
