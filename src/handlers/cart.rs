use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::ApiError,
    models::{AddToCartRequest, CartItem, CartView, UpdateCartItemRequest},
    response::{created, ok, ApiResponse},
    AppState,
};

#[derive(Serialize)]
pub struct CartTotalResponse {
    pub total: Decimal,
}

pub async fn get_cart(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let lines = state.store.get_cart(user.id).await?;
    Ok(ok(CartView::new(lines), "Cart retrieved successfully"))
}

pub async fn add_to_cart(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartItem>>), ApiError> {
    req.validate()?;
    let item = state.store.add_to_cart(user.id, req).await?;
    Ok(created(item, "Item added to cart successfully"))
}

pub async fn update_cart_item(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<UpdateCartItemRequest>,
) -> Result<Json<ApiResponse<CartItem>>, ApiError> {
    req.validate()?;
    let item = state
        .store
        .update_cart_item(user.id, item_id, req.quantity)
        .await?;
    Ok(ok(item, "Cart item updated successfully"))
}

pub async fn remove_cart_item(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.remove_cart_item(user.id, item_id).await?;
    Ok(ok((), "Item removed from cart successfully"))
}

pub async fn clear_cart(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.clear_cart(user.id).await?;
    Ok(ok((), "Cart cleared successfully"))
}

pub async fn get_cart_total(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CartTotalResponse>>, ApiError> {
    let total = state.store.cart_total(user.id).await?;
    Ok(ok(
        CartTotalResponse { total },
        "Cart total calculated successfully",
    ))
}
