use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(24); // Token expires in 24 hours

        Self {
            sub: user_id.to_string(),
            email,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String, // admin id
    pub username: String,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl AdminClaims {
    pub fn new(admin_id: Uuid, username: String) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(24);

        Self {
            sub: admin_id.to_string(),
            username,
            is_admin: true,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

fn secret() -> String {
    env::var("JWT_SECRET").expect("JWT_SECRET must be set")
}

pub fn create_token(user_id: Uuid, email: String) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, email);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret().as_ref()),
    )
}

pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret().as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub fn create_admin_token(
    admin_id: Uuid,
    username: String,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = AdminClaims::new(admin_id, username);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret().as_ref()),
    )
}

pub fn verify_admin_token(token: &str) -> Result<AdminClaims, jsonwebtoken::errors::Error> {
    let token_data = decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret().as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// The verified user identity for a request. Extracted from the
/// `Authorization: Bearer` header; handlers trust the id as-is and only
/// apply ownership scoping on top of it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}

/// The verified admin identity for a request.
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    pub id: Uuid,
    pub username: String,
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = verify_token(token).map_err(|_| ApiError::Unauthenticated)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthenticated)?;

        Ok(CurrentUser {
            id,
            email: claims.email,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = verify_admin_token(token).map_err(|_| ApiError::Unauthenticated)?;
        if !claims.is_admin {
            return Err(ApiError::Unauthenticated);
        }
        let id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthenticated)?;

        Ok(CurrentAdmin {
            id,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_secret() {
        env::set_var("JWT_SECRET", "test-secret");
    }

    #[test]
    fn user_token_round_trip() {
        set_secret();
        let id = Uuid::new_v4();
        let token = create_token(id, "shopper@example.com".to_string()).unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.email, "shopper@example.com");
    }

    #[test]
    fn admin_token_is_not_a_user_token() {
        set_secret();
        let id = Uuid::new_v4();
        let token = create_token(id, "shopper@example.com".to_string()).unwrap();
        // A plain user token has no is_admin claim and must not verify as admin.
        assert!(verify_admin_token(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        set_secret();
        assert!(verify_token("not-a-jwt").is_err());
    }
}
