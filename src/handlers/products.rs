use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::CurrentAdmin,
    error::ApiError,
    models::{CreateProductRequest, Product, UpdateProductRequest},
    response::{created, ok, ApiResponse},
    AppState,
};

#[derive(Deserialize)]
pub struct ProductListQuery {
    pub category_id: Option<Uuid>,
    pub featured: Option<bool>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn get_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    let products = if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
        state.store.search_products(&search).await?
    } else if let Some(category_id) = query.category_id {
        state.store.list_products_by_category(category_id).await?
    } else if query.featured.unwrap_or(false) {
        state.store.list_featured_products().await?
    } else {
        state.store.list_products().await?
    };

    Ok(ok(products, "Products retrieved successfully"))
}

pub async fn get_featured_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    let products = state.store.list_featured_products().await?;
    Ok(ok(products, "Featured products retrieved successfully"))
}

pub async fn get_products_by_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    // Surface a clean 404 for a bogus category rather than an empty list.
    state.store.get_category(category_id).await?;
    let products = state.store.list_products_by_category(category_id).await?;
    Ok(ok(products, "Products retrieved successfully"))
}

pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    if query.q.trim().is_empty() {
        return Err(ApiError::Validation(
            "search query must not be empty".to_string(),
        ));
    }
    let products = state.store.search_products(&query.q).await?;
    Ok(ok(products, "Search results retrieved successfully"))
}

pub async fn get_product_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let product = state.store.get_product(id).await?;
    Ok(ok(product, "Product retrieved successfully"))
}

pub async fn create_product(
    _admin: CurrentAdmin,
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ApiError> {
    req.validate()?;
    let product = state.store.create_product(req).await?;
    Ok(created(product, "Product created successfully"))
}

pub async fn update_product(
    _admin: CurrentAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    req.validate()?;
    let product = state.store.update_product(id, req).await?;
    Ok(ok(product, "Product updated successfully"))
}

pub async fn delete_product(
    _admin: CurrentAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.delete_product(id).await?;
    Ok(ok((), "Product deleted successfully"))
}
