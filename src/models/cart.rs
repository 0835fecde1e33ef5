use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::catalog::Product;
use crate::error::ApiError;

/// One row per (user, product) pair; repeated adds accumulate quantity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cart row joined with the live product for display. The product snapshot
/// here is current catalog data; nothing is frozen until order placement.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: Uuid,
    pub quantity: i32,
    pub product: Product,
}

impl CartLine {
    pub fn new(item: CartItem, product: Product) -> Self {
        Self {
            id: item.id,
            quantity: item.quantity,
            product,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total: Decimal,
}

impl CartView {
    pub fn new(items: Vec<CartLine>) -> Self {
        let total = items.iter().map(CartLine::line_total).sum();
        Self { items, total }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl AddToCartRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.quantity <= 0 {
            return Err(ApiError::Validation(
                "quantity must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

impl UpdateCartItemRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.quantity <= 0 {
            return Err(ApiError::Validation(
                "quantity must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}
