use axum::{extract::State, response::IntoResponse, Json};

use crate::error::AppError;
use crate::handlers::dto::AddToCartBody;
use crate::middleware::auth::AuthUser;
use crate::validation::validate_product_id;
use crate::AppState;

pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let items = state.engine.cart(&user).await?;
    Ok(Json(items))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<AddToCartBody>,
) -> Result<impl IntoResponse, AppError> {
    let product_id = body.product_id.trim();
    validate_product_id(product_id)?;

    let item = state
        .engine
        .add_to_cart(&user, product_id, body.quantity.unwrap_or(1))
        .await?;
    Ok(Json(item))
}
