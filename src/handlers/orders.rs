use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::{CurrentAdmin, CurrentUser},
    error::ApiError,
    models::{
        CheckoutRequest, CreateOrderRequest, Order, OrderListQuery, OrderStats, OrderView,
        UpdateOrderStatusRequest,
    },
    response::{created, ok, ApiResponse},
    AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Serialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderView>,
    pub pagination: Pagination,
}

pub async fn get_user_orders(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ApiError> {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.filter(|o| *o >= 0).unwrap_or(0);

    let (orders, total) = state
        .store
        .get_user_orders(user.id, query.status, limit, offset)
        .await?;

    Ok(ok(
        OrderListResponse {
            orders,
            pagination: Pagination {
                total,
                limit,
                offset,
            },
        },
        "Orders retrieved successfully",
    ))
}

pub async fn get_order_by_id(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
    let order = state.store.get_order(user.id, order_id).await?;
    Ok(ok(order, "Order retrieved successfully"))
}

/// "Buy now": places an order for the items in the request body. The cart is
/// not touched.
pub async fn create_order(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderView>>), ApiError> {
    req.validate()?;
    let order = state.store.create_order(user.id, req).await?;
    Ok(created(order, "Order created successfully"))
}

/// Converts the caller's cart into an order and clears it, all inside one
/// transaction.
pub async fn checkout(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderView>>), ApiError> {
    req.validate()?;
    let order = state
        .store
        .create_order_from_cart(user.id, &req.shipping_address)
        .await?;
    Ok(created(order, "Order created successfully"))
}

pub async fn update_order_status(
    _admin: CurrentAdmin,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .store
        .update_order_status(order_id, req.status)
        .await?;
    Ok(ok(order, "Order status updated successfully"))
}

pub async fn get_order_stats(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OrderStats>>, ApiError> {
    let stats = state.store.order_stats(user.id).await?;
    Ok(ok(stats, "Order statistics retrieved successfully"))
}
