use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    pub brand: Option<String>,
    pub rating: Decimal,
    pub review_count: i32,
    pub category_id: Uuid,
    pub is_featured: bool,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    pub category_id: Uuid,
    pub brand: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("product name is required".to_string()));
        }
        if self.price < Decimal::ZERO {
            return Err(ApiError::Validation(
                "price must not be negative".to_string(),
            ));
        }
        if self.stock < 0 {
            return Err(ApiError::Validation(
                "stock must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update with tagged presence: `None` leaves the field unchanged,
/// `Some` sets it — including `Some(0)` and `Some("")`, which the old
/// zero-means-unset convention could not express.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub is_featured: Option<bool>,
    pub is_available: Option<bool>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ApiError::Validation(
                    "product name must not be empty".to_string(),
                ));
            }
        }
        if let Some(price) = self.price {
            if price < Decimal::ZERO {
                return Err(ApiError::Validation(
                    "price must not be negative".to_string(),
                ));
            }
        }
        if let Some(stock) = self.stock {
            if stock < 0 {
                return Err(ApiError::Validation(
                    "stock must not be negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub icon: Option<String>,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation(
                "category name is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub icon: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn create_request_rejects_negative_price() {
        let req = CreateProductRequest {
            name: "Phone".to_string(),
            description: String::new(),
            price: dec!(-1),
            stock: 5,
            image_url: None,
            category_id: Uuid::new_v4(),
            brand: None,
            is_featured: false,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn update_request_allows_explicit_zero_price() {
        let req = UpdateProductRequest {
            price: Some(Decimal::ZERO),
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn absent_fields_deserialize_as_none() {
        let req: UpdateProductRequest = serde_json::from_str(r#"{"stock": 0}"#).unwrap();
        assert_eq!(req.stock, Some(0));
        assert!(req.price.is_none());
        assert!(req.name.is_none());
    }
}
