use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::domain::OrderStatus;
use crate::error::AppError;
use crate::handlers::dto::{OrderView, UpdateStatusBody};
use crate::AppState;

/// `PATCH /admin/orders/:id/status`, guarded by `admin_auth`.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<impl IntoResponse, AppError> {
    let status: OrderStatus = body
        .status
        .parse()
        .map_err(|_| AppError::Validation(format!("unknown order status '{}'", body.status)))?;

    let order = state.engine.update_status(id, status).await?;
    Ok(Json(OrderView::from(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (order, items) = state.engine.order_with_items(id).await?;
    Ok(Json(OrderView::with_items(order, items)))
}
