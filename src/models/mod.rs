pub mod cart;
pub mod catalog;
pub mod history;
pub mod order;

// Re-export only the types we actually use
pub use cart::{AddToCartRequest, CartItem, CartLine, CartView, UpdateCartItemRequest};
pub use catalog::{
    Category, CreateCategoryRequest, CreateProductRequest, Product, UpdateCategoryRequest,
    UpdateProductRequest,
};
pub use history::{HistoryFilter, HistoryStats, PurchaseHistory, PurchaseHistoryResponse};
pub use order::{
    CheckoutRequest, CreateOrderRequest, Order, OrderItem, OrderItemRequest, OrderItemView,
    OrderListQuery, OrderStats, OrderStatus, OrderView, StatusCount, UpdateOrderStatusRequest,
};
