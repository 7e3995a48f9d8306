//! `/transactions` endpoints.

use axum::extract::{Path, State};
use serde_json::json;

use crate::api::extractors::{AdminCaller, ApiJson, ApiQuery, Caller, VerifiedCaller};
use crate::api::types::{ApiResult, Reply, StatusBody, TransactionBody, TransactionQuery};
use crate::api::AppState;
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{NewTransaction, PageRequest, PayeeRef};
use crate::models::{Transaction, TransactionStatus, TransactionType, TransactionView};

fn new_transaction(body: TransactionBody) -> NewTransaction {
    NewTransaction {
        amount: body.amount,
        payee: PayeeRef::from_request(body.payment_method_id.as_deref()),
        transaction_reference: body.transaction_reference,
    }
}

fn summary(t: &Transaction) -> serde_json::Value {
    let payment_method = if t.is_manual() {
        "manual"
    } else {
        t.payment_method_type.as_str()
    };
    json!({
        "transactionId": t.id,
        "amount": t.amount,
        "status": t.status,
        "paymentMethod": payment_method,
        "createdAt": t.created_at,
    })
}

fn parse_status(raw: &str) -> CoreResult<TransactionStatus> {
    TransactionStatus::parse(raw).ok_or_else(|| CoreError::validation("Invalid transaction status"))
}

pub async fn deposit(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiJson(body): ApiJson<TransactionBody>,
) -> ApiResult {
    let t = state
        .transactions
        .deposit(&user.id, new_transaction(body))
        .await?;
    Ok(Reply::created("Deposit request created successfully", summary(&t)))
}

pub async fn withdrawal(
    State(state): State<AppState>,
    VerifiedCaller(user): VerifiedCaller,
    ApiJson(body): ApiJson<TransactionBody>,
) -> ApiResult {
    let t = state
        .transactions
        .withdraw(&user.id, new_transaction(body))
        .await?;
    Ok(Reply::created("Withdrawal request submitted successfully", summary(&t)))
}

pub async fn list(
    State(state): State<AppState>,
    Caller(user): Caller,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> ApiResult {
    let kind = query
        .kind
        .as_deref()
        .map(|k| {
            TransactionType::parse(k)
                .ok_or_else(|| CoreError::validation("Invalid transaction type"))
        })
        .transpose()?;
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let page = PageRequest::new(query.page.unwrap_or(1), query.limit.unwrap_or(10));

    let page = state
        .transactions
        .list(&user.id, user.is_admin, kind, status, page)
        .await?;
    Ok(Reply::ok(json!({
        "transactions": page.items,
        "pagination": page.pagination,
    })))
}

pub async fn get(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(transaction_id): Path<String>,
) -> ApiResult<TransactionView> {
    let view = state
        .transactions
        .get(&user.id, user.is_admin, &transaction_id)
        .await?;
    Ok(Reply::ok(view))
}

pub async fn update_status(
    State(state): State<AppState>,
    AdminCaller(_): AdminCaller,
    Path(transaction_id): Path<String>,
    ApiJson(body): ApiJson<StatusBody>,
) -> ApiResult {
    let next = parse_status(&body.status)?;
    let change = state
        .transactions
        .update_status(&transaction_id, next, body.admin_note.as_deref())
        .await?;

    let t = change.transaction;
    Ok(Reply::ok(json!({
        "transactionId": t.id,
        "status": t.status,
        "type": t.kind,
        "amount": t.amount,
        "credited": change.credited,
    }))
    .with_message(format!("Transaction {}", next.as_str())))
}
