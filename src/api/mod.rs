//! HTTP surface.
//!
//! Thin axum handlers over the lifecycle managers. Authentication and
//! token issuance live in front of this service; see [`extractors`].

pub mod extractors;
mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::TradeRules;
use crate::db::Database;
use crate::lifecycle::{
    AccountService, EventBoard, Mailer, PayeeBook, SubscriptionManager, TradeManager,
    TransactionWorkflow,
};
use handlers::{auth, bots, events, payees, trades, transactions, users};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub trades: TradeManager,
    pub subscriptions: SubscriptionManager,
    pub transactions: TransactionWorkflow,
    pub payees: PayeeBook,
    pub accounts: AccountService,
    pub events: EventBoard,
}

impl AppState {
    pub fn new(
        db: Database,
        rules: TradeRules,
        mailer: Arc<dyn Mailer>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            trades: TradeManager::new(db.clone(), rules.clone()),
            subscriptions: SubscriptionManager::new(db.clone(), rules.clone()),
            transactions: TransactionWorkflow::new(db.clone(), rules),
            payees: PayeeBook::new(db.clone()),
            accounts: AccountService::new(db.clone(), mailer, frontend_url),
            events: EventBoard::new(db.clone()),
            db,
        }
    }
}

/// Build the application router under `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/trades", trade_routes())
        .nest("/bots", bot_routes())
        .nest("/transactions", transaction_routes())
        .nest("/payments", payment_routes())
        .nest("/banks", bank_routes())
        .nest("/users", user_routes())
        .nest("/events", event_routes());

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/verify-reset-token", post(auth::verify_reset_token))
        .route("/reset-password-with-token", post(auth::reset_password_with_token))
        .route("/profile", get(auth::profile))
}

fn trade_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(trades::list))
        .route("/start", post(trades::start))
        .route("/graph/data", get(trades::graph_data))
        .route("/:trade_id", get(trades::get))
        .route("/:trade_id/complete", post(trades::complete))
}

fn bot_routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(bots::plans))
        .route("/subscription", get(bots::subscription))
        .route("/purchase", post(bots::purchase))
        .route("/request-subscription", post(bots::request_subscription))
        .route("/cancel-subscription", post(bots::cancel_subscription))
        .route("/admin/subscriptions", get(bots::admin_list))
        .route("/admin/subscriptions/:subscription_id", put(bots::review))
}

fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(transactions::list))
        .route("/deposit", post(transactions::deposit))
        .route("/withdrawal", post(transactions::withdrawal))
        .route("/:transaction_id", get(transactions::get))
        .route("/:transaction_id/status", put(transactions::update_status))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(payees::list_payment_methods).post(payees::add_payment_method),
        )
        .route(
            "/:method_id",
            put(payees::update_payment_method).delete(payees::delete_payment_method),
        )
        .route("/:method_id/default", patch(payees::set_default_payment_method))
}

fn bank_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(payees::list_bank_accounts).post(payees::add_bank_account),
        )
        .route(
            "/:account_id",
            put(payees::update_bank_account).delete(payees::delete_bank_account),
        )
        .route("/:account_id/default", put(payees::set_default_bank_account))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", put(users::update_profile))
        .route("/dashboard", get(users::dashboard))
        .route("/referrals", get(users::referrals))
        .route("/all", get(users::list_users))
        .route(
            "/:user_id",
            get(users::user_detail).delete(users::delete_user),
        )
        .route("/:user_id/payment-methods", get(payees::user_payment_methods))
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list).post(events::create))
        .route("/:event_id", put(events::update).delete(events::delete))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{seed_admin, seed_user};
    use crate::ledger::wallet;
    use crate::lifecycle::{Registration, StartTrade, TracingMailer};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::extractors::USER_ID_HEADER;

    async fn setup() -> (Database, Router, AppState) {
        let db = Database::in_memory().await.unwrap();
        let state = AppState::new(
            db.clone(),
            TradeRules::default(),
            Arc::new(TracingMailer),
            "http://localhost:3000",
        );
        (db, router(state.clone()), state)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(id) = user_id {
            request = request.header(USER_ID_HEADER, id);
        }
        let body = match body {
            Some(json_body) => Body::from(serde_json::to_vec(&json_body).unwrap()),
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_public_plans() {
        let (_, app, _) = setup().await;
        let (status, body) = call(&app, "GET", "/api/bots/plans", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_caller_checks() {
        let (db, app, state) = setup().await;
        let start = json!({ "amount": 5000, "isBot": false });

        let (status, body) = call(&app, "POST", "/api/trades/start", None, Some(start.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) =
            call(&app, "POST", "/api/trades/start", Some("ghost"), Some(start.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let unverified = state
            .accounts
            .register(Registration {
                full_name: "New Person".to_string(),
                email: "new@example.com".to_string(),
                password_hash: "hash".to_string(),
                referral_code: None,
            })
            .await
            .unwrap();
        let (status, _) =
            call(&app, "POST", "/api/trades/start", Some(&unverified.id), Some(start)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let user = seed_user(&db, "plain@example.com", dec!(0)).await;
        let (status, body) = call(&app, "GET", "/api/users/all", Some(&user.id), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Forbidden: Admin access required");
    }

    #[tokio::test]
    async fn test_trade_start_over_http() {
        let (db, app, _) = setup().await;
        let broke = seed_user(&db, "broke@example.com", dec!(0)).await;
        let funded = seed_user(&db, "funded@example.com", dec!(10000)).await;
        let start = json!({ "amount": 5000, "isBot": false });

        let (status, body) =
            call(&app, "POST", "/api/trades/start", Some(&broke.id), Some(start.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Insufficient balance to start this trade");

        let (status, body) =
            call(&app, "POST", "/api/trades/start", Some(&funded.id), Some(start)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Trade started successfully");
        assert_eq!(body["data"]["status"], "active");

        let (status, body) = call(&app, "GET", "/api/trades?status=active", Some(&funded.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["total"], 1);

        let (balance, _) = wallet(&db, &funded.id).await.unwrap().unwrap();
        assert_eq!(balance, dec!(5000));
    }

    #[tokio::test]
    async fn test_malformed_input_gets_envelope() {
        let (db, app, _) = setup().await;
        let user = seed_user(&db, "sloppy@example.com", dec!(10000)).await;

        for body in [json!({ "isBot": false }), json!({ "amount": "abc" })] {
            let (status, body) =
                call(&app, "POST", "/api/trades/start", Some(&user.id), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["success"], false);
            assert!(body["message"].as_str().unwrap().contains("deserialize"));
        }

        let (status, body) =
            call(&app, "GET", "/api/trades?page=first", Some(&user.id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (balance, _) = wallet(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(balance, dec!(10000));
    }

    #[tokio::test]
    async fn test_trade_completion_body_over_http() {
        let (db, app, state) = setup().await;
        let user = seed_user(&db, "closer@example.com", dec!(20000)).await;
        let first = state
            .trades
            .start(
                &user.id,
                StartTrade {
                    amount: dec!(5000),
                    is_bot: false,
                },
            )
            .await
            .unwrap();
        let uri = format!("/api/trades/{}/complete", first.id);

        let (status, body) = call(
            &app,
            "POST",
            &uri,
            Some(&user.id),
            Some(json!({ "profit": "oops", "profitPercentage": 40 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(state.trades.get(&user.id, &first.id).await.unwrap().is_active());

        // No body at all means the stored terms
        let (status, body) = call(&app, "POST", &uri, Some(&user.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "completed");

        let (balance, profit) = wallet(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(balance, dec!(20500));
        assert_eq!(profit, dec!(500));
    }

    #[tokio::test]
    async fn test_profile_for_unverified_caller() {
        let (_, app, state) = setup().await;
        let fresh = state
            .accounts
            .register(Registration {
                full_name: "Hina Malik".to_string(),
                email: "hina@example.com".to_string(),
                password_hash: "hash".to_string(),
                referral_code: None,
            })
            .await
            .unwrap();

        let (status, _) = call(&app, "GET", "/api/auth/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, "GET", "/api/auth/profile", Some(&fresh.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "hina@example.com");
        assert_eq!(body["data"]["referralCode"], fresh.referral_code.as_str());
        assert_eq!(body["data"]["referralCount"], 0);
        assert_eq!(body["data"]["isAdmin"], false);
        assert!(body["data"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_event_board_over_http() {
        let (db, app, _) = setup().await;
        let admin = seed_admin(&db, "boss@example.com").await;
        let user = seed_user(&db, "reader@example.com", dec!(0)).await;
        let notice = json!({ "title": "Eid bonus", "description": "Double referral rewards" });

        let (status, _) = call(&app, "POST", "/api/events", Some(&user.id), Some(notice.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            "POST",
            "/api/events",
            Some(&admin.id),
            Some(json!({ "title": "No body" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Title and description are required");

        let (status, body) = call(&app, "POST", "/api/events", Some(&admin.id), Some(notice)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Event created successfully");
        assert_eq!(body["data"]["isActive"], true);
        let event_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "GET", "/api/events", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["title"], "Eid bonus");

        let uri = format!("/api/events/{}", event_id);
        let (status, body) = call(
            &app,
            "PUT",
            &uri,
            Some(&admin.id),
            Some(json!({ "isActive": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isActive"], false);

        let (_, body) = call(&app, "GET", "/api/events", None, None).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, body) = call(&app, "DELETE", &uri, Some(&admin.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Event deleted successfully");

        let (status, body) = call(&app, "DELETE", &uri, Some(&admin.id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Event not found");
    }

    #[tokio::test]
    async fn test_deposit_review_over_http() {
        let (db, app, _) = setup().await;
        let admin = seed_admin(&db, "admin@example.com").await;
        let user = seed_user(&db, "payer@example.com", dec!(0)).await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/transactions/deposit",
            Some(&user.id),
            Some(json!({
                "amount": 8000,
                "paymentMethodId": "manual",
                "transactionReference": "https://cdn.example.com/proof.png"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["paymentMethod"], "manual");
        let id = body["data"]["transactionId"].as_str().unwrap().to_string();
        let uri = format!("/api/transactions/{}/status", id);

        let (status, _) = call(
            &app,
            "PUT",
            &uri,
            Some(&user.id),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            "PUT",
            &uri,
            Some(&admin.id),
            Some(json!({ "status": "bogus" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid transaction status");

        for _ in 0..2 {
            let (status, body) = call(
                &app,
                "PUT",
                &uri,
                Some(&admin.id),
                Some(json!({ "status": "completed", "adminNote": "ok" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], "Transaction completed");
        }

        let (balance, _) = wallet(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(balance, dec!(8000));

        let (status, body) = call(&app, "GET", "/api/transactions", Some(&user.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["transactions"][0]["paymentMethod"]["id"], "manual");
    }

    #[tokio::test]
    async fn test_subscription_overview_states() {
        let (db, app, _) = setup().await;
        let user = seed_user(&db, "bots@example.com", dec!(20000)).await;

        let (status, body) = call(&app, "GET", "/api/bots/subscription", Some(&user.id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["isPending"], false);

        let (status, _) = call(
            &app,
            "POST",
            "/api/bots/purchase",
            Some(&user.id),
            Some(json!({ "planId": "advanced" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&app, "GET", "/api/bots/subscription", Some(&user.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isActive"], true);
        assert_eq!(body["data"]["botType"], "advanced");

        let (status, body) = call(
            &app,
            "POST",
            "/api/bots/purchase",
            Some(&user.id),
            Some(json!({ "planId": "ultra" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid bot plan selected");
    }

    #[tokio::test]
    async fn test_bank_default_over_http() {
        let (db, app, _) = setup().await;
        let user = seed_user(&db, "banks@example.com", dec!(0)).await;

        let mut ids = Vec::new();
        for number in ["1111222233", "4444555566"] {
            let (status, body) = call(
                &app,
                "POST",
                "/api/banks",
                Some(&user.id),
                Some(json!({
                    "bankName": "HBL",
                    "accountNumber": number,
                    "accountHolder": "Owner"
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(body["data"]["id"].as_str().unwrap().to_string());
        }

        let uri = format!("/api/banks/{}/default", ids[1]);
        let (status, _) = call(&app, "PUT", &uri, Some(&user.id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, "GET", "/api/banks", Some(&user.id), None).await;
        let accounts = body["data"].as_array().unwrap();
        let defaults: Vec<&Value> = accounts.iter().filter(|a| a["isDefault"] == true).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0]["id"], ids[1].as_str());
    }
}
