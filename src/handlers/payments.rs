use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::User;
use crate::error::{AppError, SUPPORT_CHARGE_POSSIBLE};
use crate::handlers::dto::{CustomerDetailsBody, IntentBody, IntentView, SelectionBody, VerifyDirectBody, VerifyPaymentBody};
use crate::middleware::auth::MaybeUser;
use crate::services::{IntentOutcome, PaymentCallback, SettlementContext, VerificationOutcome};
use crate::AppState;

/// `POST /payment-intent`. A gateway outage is a 200 telling the client to offer COD.
pub async fn create_intent(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(body): Json<IntentBody>,
) -> Result<Response, AppError> {
    if let Some(currency) = body.currency.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        if !currency.eq_ignore_ascii_case(state.engine.currency()) {
            return Err(AppError::Validation(format!(
                "currency must be {}",
                state.engine.currency()
            )));
        }
    }

    let selection = body.selection.into_selection()?;
    let outcome = state.engine.create_intent(&selection, user.as_ref()).await?;

    let response = match outcome {
        IntentOutcome::Created { intent, .. } => Json(IntentView::from(intent)).into_response(),
        IntentOutcome::CodFallback { reason } => Json(json!({
            "showCODOption": true,
            "message": reason,
        }))
        .into_response(),
    };
    Ok(response)
}

pub async fn verify_payment(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(body): Json<VerifyPaymentBody>,
) -> Result<Response, AppError> {
    let callback = PaymentCallback {
        gateway_order_id: body.gateway_order_id,
        gateway_payment_id: body.gateway_payment_id,
        signature: body.signature,
    };
    let context = settlement_context(body.order_id, body.customer_details, body.selection, user);

    let outcome = state.engine.verify_and_confirm(callback, context).await?;
    Ok(verification_response(outcome))
}

pub async fn verify_payment_direct(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(body): Json<VerifyDirectBody>,
) -> Result<Response, AppError> {
    let context = settlement_context(body.order_id, body.customer_details, body.selection, user);

    let outcome = match body.gateway_payment_id {
        Some(payment_id) => state.engine.verify_direct(payment_id, context).await?,
        None => {
            return Err(AppError::PaymentVerification {
                message: "payment details were not received".to_string(),
                support_info: SUPPORT_CHARGE_POSSIBLE,
            })
        }
    };
    Ok(verification_response(outcome))
}

/// Invalid customer details or items are carried into the engine rather than
/// rejected here, since the payment they accompany may already be captured.
fn settlement_context(
    order_id: Option<uuid::Uuid>,
    customer_details: Option<CustomerDetailsBody>,
    selection: SelectionBody,
    user: Option<User>,
) -> SettlementContext {
    let mut problems = Vec::new();

    let customer = match customer_details.map(CustomerDetailsBody::into_snapshot).transpose() {
        Ok(customer) => customer,
        Err(err) => {
            problems.push(err.to_string());
            None
        }
    };
    let selection = match selection.into_optional_selection() {
        Ok(selection) => selection,
        Err(err) => {
            problems.push(err.to_string());
            None
        }
    };

    if !problems.is_empty() {
        tracing::warn!(problems = ?problems, "verification request carried unusable order details");
    }

    SettlementContext {
        order_id,
        customer,
        selection,
        user,
        invalid_details: (!problems.is_empty()).then(|| problems.join("; ")),
    }
}

fn verification_response(outcome: VerificationOutcome) -> Response {
    match outcome {
        VerificationOutcome::Confirmed { order } => Json(json!({
            "success": true,
            "orderId": order.id,
            "status": order.status,
            "verification": order.verification,
        }))
        .into_response(),
        VerificationOutcome::AlreadyProcessed { order } => Json(json!({
            "success": true,
            "alreadyProcessed": true,
            "orderId": order.id,
            "status": order.status,
            "verification": order.verification,
        }))
        .into_response(),
        VerificationOutcome::PaymentCapturedOrderFailed { gateway_payment_id, .. } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "paymentVerified": true,
                "orderCreated": false,
                "paymentId": gateway_payment_id,
                "supportInfo": SUPPORT_CHARGE_POSSIBLE,
            })),
        )
            .into_response(),
    }
}
