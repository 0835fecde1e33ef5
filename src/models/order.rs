use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::catalog::Product;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "order_status", rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Legal moves: PENDING → CONFIRMED → SHIPPED → DELIVERED, and CANCELLED
    /// from any non-terminal state. Everything else is rejected.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed) | (Confirmed, Shipped) | (Shipped, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Derived at creation from the item snapshots; never recomputed.
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub is_installment: bool,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price captured at order time; historical orders never reprice.
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Order item joined with the current product row for display. `price` is the
/// frozen snapshot; `product.price` is whatever the catalog says today.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub product: Product,
}

impl OrderItemView {
    pub fn new(item: OrderItem, product: Product) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
            product,
        }
    }
}

/// Denormalized order response: the order plus its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub is_installment: bool,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    pub fn new(order: Order, items: Vec<OrderItemView>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: order.status,
            payment_method: order.payment_method,
            is_installment: order.is_installment,
            shipping_address: order.shipping_address,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items,
        }
    }
}

/// "Buy now" order placement: the item list comes from the request body and
/// the cart is left alone.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub payment_method: String,
    #[serde(default)]
    pub is_installment: bool,
    pub shipping_address: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.shipping_address.trim().is_empty() {
            return Err(ApiError::Validation(
                "shipping address is required".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Err(ApiError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(ApiError::Validation(
                    "quantity must be a positive integer".to_string(),
                ));
            }
            if !seen.insert(item.product_id) {
                return Err(ApiError::Validation(format!(
                    "duplicate product in order items: {}",
                    item.product_id
                )));
            }
        }
        Ok(())
    }
}

/// Checkout: convert the caller's cart into an order.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
}

impl CheckoutRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.shipping_address.trim().is_empty() {
            return Err(ApiError::Validation(
                "shipping address is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    pub status_counts: Vec<StatusCount>,
    /// Sum of total_amount over DELIVERED orders only.
    pub total_spent: Decimal,
    pub last_order_date: Option<DateTime<Utc>>,
}
