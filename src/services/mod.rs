pub mod errors;
pub mod pricing;
pub mod reconciliation;

pub use errors::{EngineError, EngineResult};
pub use pricing::{Quote, QuotedLine};
pub use reconciliation::{
    CheckoutOutcome, CheckoutRequest, EngineSettings, IntentOutcome, OrderEngine, PaymentCallback,
    SettlementContext, VerificationOutcome,
};
