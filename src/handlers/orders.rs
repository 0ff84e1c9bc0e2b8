use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::dto::{CancelBody, CheckoutBody, IntentView, OrderView};
use crate::middleware::auth::{AuthUser, MaybeUser};
use crate::services::CheckoutRequest;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order: OrderView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<IntentView>,
    #[serde(rename = "showCODOption", skip_serializing_if = "std::ops::Not::not")]
    pub show_cod_option: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /orders`. Guests may check out with COD only.
pub async fn create_order(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(body): Json<CheckoutBody>,
) -> Result<impl IntoResponse, AppError> {
    let payment_method = body.payment_method()?;
    let selection = body.selection.into_selection()?;
    let customer = body.customer.into_snapshot()?;

    let outcome = state
        .engine
        .checkout(
            CheckoutRequest {
                customer,
                selection,
                payment_method,
            },
            user.as_ref(),
        )
        .await?;

    Ok(Json(CheckoutResponse {
        order: outcome.order.into(),
        payment: outcome.intent.map(IntentView::from),
        show_cod_option: outcome.cod_fallback.is_some(),
        message: outcome.cod_fallback,
    }))
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.engine.orders_for_user(&user).await?;
    Ok(Json(orders.into_iter().map(OrderView::from).collect::<Vec<_>>()))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (order, items) = state.engine.order_for_user(id, &user).await?;
    Ok(Json(OrderView::with_items(order, items)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<impl IntoResponse, AppError> {
    let (reason, details) = body.validated()?;
    let order = state
        .engine
        .cancel(id, &user, &reason, details.as_deref())
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "order": OrderView::from(order),
    })))
}
