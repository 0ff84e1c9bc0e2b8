//! Failure taxonomy of the order reconciliation engine.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::OrderStatus;
use crate::ports::{GatewayError, RepositoryError};
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("order {0} belongs to another customer")]
    Forbidden(Uuid),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("product {0} not found")]
    ProductNotFound(String),

    #[error("product {0} is out of stock")]
    ProductUnavailable(String),

    /// Gateway lookup failed on a verification path. A charge may exist.
    #[error("payment gateway unavailable")]
    GatewayUnavailable(#[source] GatewayError),

    #[error("payment verification failed: {reason}")]
    PaymentVerificationFailed {
        reason: String,
        /// True when the customer may have been charged (direct path).
        charge_possible: bool,
    },

    /// Callback carried neither a signature triple nor a payment id.
    #[error("payment data missing from callback")]
    PaymentDataMissing,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order {0} was modified concurrently")]
    Conflict(Uuid),

    #[error("storage failure")]
    Storage(#[source] RepositoryError),
}

impl EngineError {
    pub fn verification(reason: impl Into<String>, charge_possible: bool) -> Self {
        EngineError::PaymentVerificationFailed {
            reason: reason.into(),
            charge_possible,
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        EngineError::Storage(err)
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
