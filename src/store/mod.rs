pub mod memory;
pub mod postgres;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    AddToCartRequest, CartItem, CartLine, Category, CreateCategoryRequest, CreateOrderRequest,
    CreateProductRequest, HistoryFilter, HistoryStats, Order, OrderStats, OrderStatus, OrderView,
    Product, PurchaseHistory, UpdateCategoryRequest, UpdateProductRequest,
};

pub use memory::MemStore;
pub use postgres::PgStore;

/// The persistence seam. Handlers hold an `Arc<dyn Store>`; production wires
/// in [`PgStore`], tests run against [`MemStore`]. Every multi-row mutation
/// (most importantly order placement) is atomic inside the implementation, so
/// the workflow's all-or-nothing contract holds regardless of backing store.
#[async_trait]
pub trait Store: Send + Sync {
    // Catalog
    async fn list_products(&self) -> Result<Vec<Product>, ApiError>;
    async fn list_featured_products(&self) -> Result<Vec<Product>, ApiError>;
    async fn list_products_by_category(&self, category_id: Uuid) -> Result<Vec<Product>, ApiError>;
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError>;
    async fn get_product(&self, id: Uuid) -> Result<Product, ApiError>;
    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, ApiError>;
    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> Result<Product, ApiError>;
    /// Soft delete: flips `is_available` off; the row (and every snapshot
    /// referencing it) stays.
    async fn delete_product(&self, id: Uuid) -> Result<(), ApiError>;

    // Categories
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;
    async fn get_category(&self, id: Uuid) -> Result<Category, ApiError>;
    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, ApiError>;
    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Category, ApiError>;
    /// Fails with `Conflict` while any product still references the category.
    async fn delete_category(&self, id: Uuid) -> Result<(), ApiError>;

    // Cart
    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>, ApiError>;
    /// Optimistic stock check only; the authoritative check happens again at
    /// order time inside the transaction.
    async fn add_to_cart(&self, user_id: Uuid, req: AddToCartRequest)
        -> Result<CartItem, ApiError>;
    async fn update_cart_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, ApiError>;
    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ApiError>;
    async fn clear_cart(&self, user_id: Uuid) -> Result<(), ApiError>;
    async fn cart_total(&self, user_id: Uuid) -> Result<Decimal, ApiError>;

    // Order workflow
    async fn create_order_from_cart(
        &self,
        user_id: Uuid,
        shipping_address: &str,
    ) -> Result<OrderView, ApiError>;
    async fn create_order(
        &self,
        user_id: Uuid,
        req: CreateOrderRequest,
    ) -> Result<OrderView, ApiError>;
    async fn get_user_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderView>, i64), ApiError>;
    /// Owner-scoped: someone else's order id comes back as `NotFound`, never
    /// `Forbidden`, so existence does not leak.
    async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ApiError>;
    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, ApiError>;
    async fn order_stats(&self, user_id: Uuid) -> Result<OrderStats, ApiError>;

    // Purchase history
    async fn list_purchase_history(
        &self,
        user_id: Uuid,
        filter: &HistoryFilter,
    ) -> Result<(Vec<PurchaseHistory>, i64), ApiError>;
    async fn get_purchase_history(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<PurchaseHistory, ApiError>;
    async fn purchase_stats(&self, user_id: Uuid) -> Result<HistoryStats, ApiError>;
    async fn recent_purchases(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PurchaseHistory>, ApiError>;
}
