use axum::{extract::Request, http::header, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, DecodingKey, Validation};
use mongodb::bson::oid::ObjectId;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::models::user_models::Role;
use crate::utils::error::{AppError, AppResult};

/// Verified claims of the calling user. Token issuance lives elsewhere;
/// this backend only validates what it is handed.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<ObjectId> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| AppError::invalid_input("sub", "Invalid user id in token"))
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "This operation requires an admin role".to_string(),
            ))
        }
    }
}

static DECODING_KEY: Lazy<DecodingKey> = Lazy::new(|| {
    let secret = env::var("SESSION_SECRET").unwrap_or_else(|_| {
        tracing::warn!("SESSION_SECRET not set, using development default");
        "default-secret-key".to_string()
    });
    DecodingKey::from_secret(secret.as_bytes())
});

pub fn verify_token(token: &str) -> AppResult<Claims> {
    decode::<Claims>(token, &DECODING_KEY, &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::Forbidden("Invalid or expired token".to_string()))
}

/// Pulls the token from the `token` cookie or a bearer header, verifies it,
/// and stashes the claims as a request extension.
pub async fn jwt_auth(
    cookie_jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|value| value.to_string())
        })
        .ok_or_else(|| AppError::Forbidden("No token found".to_string()))?;

    let claims = verify_token(&token)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
