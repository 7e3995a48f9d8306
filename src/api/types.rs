//! Response envelope and request bodies.
//!
//! Every response has the shape `{ success, message?, data? }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::error::CoreError;

pub type ApiResult<T = Value> = Result<Reply<T>, CoreError>;

#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

/// Handler output rendered into the envelope.
#[derive(Debug)]
pub struct Reply<T = Value> {
    status: StatusCode,
    message: Option<String>,
    data: Option<T>,
}

impl<T: Serialize> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: None,
            data: Some(data),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl Reply<Value> {
    /// Message-only success.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: self.status.is_success(),
            message: self.message,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

impl CoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::Validation(_)
            | CoreError::Conflict(_)
            | CoreError::InsufficientFunds(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            CoreError::Dependency(_) | CoreError::Database(_) | CoreError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            CoreError::Database(_) | CoreError::Internal(_) => {
                error!(error = %self, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body: Envelope<()> = Envelope {
            success: false,
            message: Some(message),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

// ==================== Request Bodies ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenBody {
    pub email: String,
    pub token: String,
}

/// The external auth layer hashes the new password before forwarding.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    pub email: String,
    pub token: String,
    pub password_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeQuery {
    pub status: Option<String>,
    pub is_bot: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanBody {
    pub plan_id: String,
    pub payment_proof_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBody {
    pub action: String,
    pub admin_note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBody {
    pub amount: Decimal,
    pub payment_method_id: Option<String>,
    pub transaction_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub status: String,
    pub admin_note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
    pub full_name: String,
}
