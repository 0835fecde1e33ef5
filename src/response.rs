use axum::{http::StatusCode, response::Json};
use serde::Serialize;

/// Success envelope: `{"data": ..., "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: &'static str,
}

pub fn ok<T: Serialize>(data: T, message: &'static str) -> Json<ApiResponse<T>> {
    Json(ApiResponse { data, message })
}

pub fn created<T: Serialize>(
    data: T,
    message: &'static str,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse { data, message }))
}
