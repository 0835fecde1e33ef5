use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::order::OrderStatus;

/// Denormalized purchase record, one row per (user, product, purchase event).
/// Product name and image are copied at purchase time so catalog edits and
/// soft deletes never corrupt a user's history view.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub order_status: OrderStatus,
    pub payment_method: Option<String>,
    pub is_installment: bool,
    pub purchase_date: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilter {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<String>,
    pub is_installment: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub product_name: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl HistoryFilter {
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.filter(|l| *l > 0).unwrap_or(10)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Client-facing projection with a few derived conveniences.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseHistoryResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub order_status: OrderStatus,
    pub payment_method: Option<String>,
    pub is_installment: bool,
    pub purchase_date: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub shipping_address: String,
    pub days_since_purchase: i64,
    pub can_review: bool,
    pub can_reorder: bool,
}

impl From<PurchaseHistory> for PurchaseHistoryResponse {
    fn from(record: PurchaseHistory) -> Self {
        let days_since_purchase = (Utc::now() - record.purchase_date).num_days();
        let can_review = record.order_status == OrderStatus::Delivered;
        let can_reorder = matches!(
            record.order_status,
            OrderStatus::Delivered | OrderStatus::Cancelled
        );

        Self {
            id: record.id,
            order_id: record.order_id,
            product_id: record.product_id,
            product_name: record.product_name,
            product_image_url: record.product_image_url,
            quantity: record.quantity,
            unit_price: record.unit_price,
            total_price: record.total_price,
            order_status: record.order_status,
            payment_method: record.payment_method,
            is_installment: record.is_installment,
            purchase_date: record.purchase_date,
            delivery_date: record.delivery_date,
            shipping_address: record.shipping_address,
            days_since_purchase,
            can_review,
            can_reorder,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryStats {
    pub total_orders: i64,
    pub total_amount: Decimal,
    pub delivered_orders: i64,
    pub pending_orders: i64,
    pub cancelled_orders: i64,
    pub avg_order_value: Decimal,
}
