use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::EngineError;
use crate::validation::ValidationError;

pub const SUPPORT_CHARGE_POSSIBLE: &str =
    "If money left your account, contact support with your payment reference before retrying.";
pub const SUPPORT_NO_CHARGE: &str = "No payment was confirmed. You can safely try again.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment could not be verified; the hint tells the customer whether a charge may exist.
    #[error("Payment verification failed: {message}")]
    PaymentVerification { message: String, support_info: &'static str },

    #[error("Payment gateway unavailable")]
    GatewayUnavailable,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentVerification { .. } => StatusCode::BAD_REQUEST,
            AppError::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn support_info(&self) -> Option<&'static str> {
        match self {
            AppError::PaymentVerification { support_info, .. } => Some(support_info),
            AppError::GatewayUnavailable => Some(SUPPORT_CHARGE_POSSIBLE),
            _ => None,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => AppError::Validation(msg),
            EngineError::AuthRequired => AppError::Unauthorized("sign in to pay online".to_string()),
            EngineError::Forbidden(_) => AppError::Forbidden("order belongs to another customer".to_string()),
            EngineError::OrderNotFound(id) => AppError::NotFound(format!("order {}", id)),
            err @ (EngineError::ProductNotFound(_) | EngineError::ProductUnavailable(_)) => {
                AppError::Validation(err.to_string())
            }
            EngineError::GatewayUnavailable(_) => AppError::GatewayUnavailable,
            EngineError::PaymentVerificationFailed {
                reason,
                charge_possible,
            } => AppError::PaymentVerification {
                message: reason,
                support_info: if charge_possible {
                    SUPPORT_CHARGE_POSSIBLE
                } else {
                    SUPPORT_NO_CHARGE
                },
            },
            EngineError::PaymentDataMissing => AppError::PaymentVerification {
                message: "payment details were not received".to_string(),
                support_info: SUPPORT_CHARGE_POSSIBLE,
            },
            err @ EngineError::InvalidTransition { .. } => AppError::Validation(err.to_string()),
            err @ EngineError::Conflict(_) => AppError::Conflict(err.to_string()),
            EngineError::Storage(source) => AppError::Internal(source.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let AppError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "internal error");
        }

        let mut body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        if let Some(info) = self.support_info() {
            body["supportInfo"] = json!(info);
        }

        (status, Json(body)).into_response()
    }
}
