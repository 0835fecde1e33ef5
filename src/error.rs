use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::models::OrderStatus;

/// Domain error taxonomy. Every store operation and handler returns these;
/// the `IntoResponse` impl maps them onto the wire as an `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("category not found")]
    CategoryNotFound,

    #[error("product not found")]
    ProductNotFound,

    #[error("product is not available")]
    ProductUnavailable,

    #[error("insufficient stock for product {name}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        name: String,
        available: i32,
        requested: i32,
    },

    #[error("cart is empty")]
    CartEmpty,

    #[error("cannot change order status from {from} to {to}")]
    IllegalStatusTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("authentication required")]
    Unauthenticated,

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Conflict(_)
            | ApiError::CategoryNotFound
            | ApiError::ProductUnavailable
            | ApiError::InsufficientStock { .. }
            | ApiError::CartEmpty
            | ApiError::IllegalStatusTransition { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::ProductNotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Never leak driver details to the client.
        let message = match &self {
            ApiError::Database(e) => {
                log::error!("database error: {}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_the_product() {
        let err = ApiError::InsufficientStock {
            name: "Galaxy S24".to_string(),
            available: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for product Galaxy S24. Available: 2, Requested: 5"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(
            ApiError::NotFound("order").status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn database_errors_map_to_500() {
        let err = ApiError::Database(sqlx::Error::PoolClosed);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
