mod auth;
mod database;
mod error;
mod handlers;
mod models;
mod response;
mod store;

use std::env;
use std::sync::Arc;

use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use dotenvy::dotenv;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use database::create_database_pool;
use store::{PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    // Initialize database
    let database_url = env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set");

    let pool = create_database_pool(&database_url).await
        .expect("Failed to connect to database");

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
    };

    // Build the application router
    let app = create_router(state);

    // Get port from environment or use default
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{}", port);

    log::info!("storefront server starting on http://{}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await
        .expect("Failed to bind server address");
    axum::serve(listener, app).await
        .expect("Server error");
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Server is running",
    })
}

fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))

        // Catalog (public reads, admin writes)
        .route("/api/v1/products",
               get(handlers::products::get_products)
               .post(handlers::products::create_product))
        .route("/api/v1/products/featured", get(handlers::products::get_featured_products))
        .route("/api/v1/products/search", get(handlers::products::search_products))
        .route("/api/v1/products/:id",
               get(handlers::products::get_product_by_id)
               .put(handlers::products::update_product)
               .delete(handlers::products::delete_product))

        // Categories
        .route("/api/v1/categories",
               get(handlers::categories::get_categories)
               .post(handlers::categories::create_category))
        .route("/api/v1/categories/:id",
               get(handlers::categories::get_category_by_id)
               .put(handlers::categories::update_category)
               .delete(handlers::categories::delete_category))
        .route("/api/v1/categories/:id/products", get(handlers::products::get_products_by_category))

        // Cart (requires authentication)
        .route("/api/v1/cart",
               get(handlers::cart::get_cart)
               .post(handlers::cart::add_to_cart)
               .delete(handlers::cart::clear_cart))
        .route("/api/v1/cart/total", get(handlers::cart::get_cart_total))
        .route("/api/v1/cart/:id",
               put(handlers::cart::update_cart_item)
               .delete(handlers::cart::remove_cart_item))

        // Orders (requires authentication; status update is admin only)
        .route("/api/v1/orders",
               get(handlers::orders::get_user_orders)
               .post(handlers::orders::create_order))
        .route("/api/v1/orders/checkout", post(handlers::orders::checkout))
        .route("/api/v1/orders/stats", get(handlers::orders::get_order_stats))
        .route("/api/v1/orders/:id", get(handlers::orders::get_order_by_id))
        .route("/api/v1/orders/:id/status", put(handlers::orders::update_order_status))

        // Purchase history (requires authentication)
        .route("/api/v1/purchase-history", get(handlers::history::get_purchase_history))
        .route("/api/v1/purchase-history/stats", get(handlers::history::get_purchase_stats))
        .route("/api/v1/purchase-history/recent", get(handlers::history::get_recent_purchases))
        .route("/api/v1/purchase-history/:id", get(handlers::history::get_purchase_history_by_id))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
        )
        .with_state(state)
}
