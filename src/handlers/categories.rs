use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::{
    auth::CurrentAdmin,
    error::ApiError,
    models::{Category, CreateCategoryRequest, UpdateCategoryRequest},
    response::{created, ok, ApiResponse},
    AppState,
};

pub async fn get_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = state.store.list_categories().await?;
    Ok(ok(categories, "Categories retrieved successfully"))
}

pub async fn get_category_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state.store.get_category(id).await?;
    Ok(ok(category, "Category retrieved successfully"))
}

pub async fn create_category(
    _admin: CurrentAdmin,
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>), ApiError> {
    req.validate()?;
    let category = state.store.create_category(req).await?;
    Ok(created(category, "Category created successfully"))
}

pub async fn update_category(
    _admin: CurrentAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state.store.update_category(id, req).await?;
    Ok(ok(category, "Category updated successfully"))
}

pub async fn delete_category(
    _admin: CurrentAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.delete_category(id).await?;
    Ok(ok((), "Category deleted successfully"))
}
