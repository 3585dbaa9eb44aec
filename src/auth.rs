use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, DecodingKey, EncodingKey, Header, Validation,
};
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    Collection,
};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use tracing::{error, info};
use validator::Validate;

use crate::config::{AppConfig, MongoConfig};
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Admin {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2))]
    pub name: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub admin: AdminResponse,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

pub async fn register(
    db: web::Data<MongoConfig>,
    config: web::Data<AppConfig>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<Admin> = db.database.collection("admins");

    if collection
        .find_one(doc! { "email": &payload.email }, None)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("email already registered".to_string()));
    }

    let password_hash = hash(payload.password.as_bytes(), DEFAULT_COST).map_err(|e| {
        error!("failed to hash password: {}", e);
        ApiError::Internal("password hashing failed".to_string())
    })?;

    let admin = Admin {
        id: None,
        email: payload.email.clone(),
        name: payload.name.clone(),
        password_hash,
        created_at: DateTime::now(),
    };

    let result = collection.insert_one(&admin, None).await?;
    let admin_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::Internal("insert returned no id".to_string()))?;

    info!("created admin account {}", admin_id);
    let (token, refresh_token) = generate_tokens(&admin_id, &config)?;

    Ok(HttpResponse::Created().json(AuthResponse {
        token,
        refresh_token,
        admin: AdminResponse {
            id: admin_id.to_string(),
            email: admin.email,
            name: admin.name,
        },
    }))
}

pub async fn login(
    db: web::Data<MongoConfig>,
    config: web::Data<AppConfig>,
    credentials: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Admin> = db.database.collection("admins");

    let admin = collection
        .find_one(doc! { "email": &credentials.email }, None)
        .await?
        .ok_or(ApiError::Unauthorized("invalid credentials"))?;

    let password_ok = verify(&credentials.password, &admin.password_hash).map_err(|e| {
        error!("password verification error: {}", e);
        ApiError::Internal("password verification failed".to_string())
    })?;
    if !password_ok {
        return Err(ApiError::Unauthorized("invalid credentials"));
    }

    let admin_id = admin
        .id
        .ok_or_else(|| ApiError::Internal("admin document missing id".to_string()))?;
    let (token, refresh_token) = generate_tokens(&admin_id, &config)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        refresh_token,
        admin: AdminResponse {
            id: admin_id.to_string(),
            email: admin.email,
            name: admin.name,
        },
    }))
}

pub async fn refresh_token(
    config: web::Data<AppConfig>,
    payload: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = decode::<Claims>(
        &payload.refresh_token,
        &DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("invalid refresh token"))?
    .claims;

    let admin_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("invalid refresh token"))?;

    let (token, refresh_token) = generate_tokens(&admin_id, &config)?;

    Ok(HttpResponse::Ok().json(doc! {
        "token": token,
        "refresh_token": refresh_token,
    }))
}

fn generate_tokens(admin_id: &ObjectId, config: &AppConfig) -> Result<(String, String), ApiError> {
    let now = Utc::now();

    // Access token (2 hours)
    let access_claims = Claims {
        sub: admin_id.to_string(),
        exp: (now + Duration::hours(2)).timestamp(),
        iat: now.timestamp(),
    };

    // Refresh token (7 days)
    let refresh_claims = Claims {
        sub: admin_id.to_string(),
        exp: (now + Duration::days(7)).timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &access_claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        error!("token generation error: {}", e);
        ApiError::Internal("token generation failed".to_string())
    })?;

    let refresh_token = encode(
        &Header::default(),
        &refresh_claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )
    .map_err(|e| {
        error!("refresh token generation error: {}", e);
        ApiError::Internal("refresh token generation failed".to_string())
    })?;

    Ok((token, refresh_token))
}

pub fn verify_token(token: &str, secret: &[u8]) -> Result<Claims, JwtError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

// Extractor that gates admin routes on a valid Bearer token. Handlers take
// an AdminUser argument instead of being wrapped in scope middleware, so
// public and admin routes can share a path prefix.
pub struct AdminUser {
    pub admin_id: String,
}

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let result = (|| {
            let config = req
                .app_data::<web::Data<AppConfig>>()
                .ok_or_else(|| ApiError::Internal("auth configuration missing".to_string()))?;

            let header = req
                .headers()
                .get("Authorization")
                .ok_or(ApiError::Unauthorized("missing authorization header"))?;
            let value = header
                .to_str()
                .map_err(|_| ApiError::Unauthorized("invalid authorization header"))?;
            let token = value
                .strip_prefix("Bearer ")
                .ok_or(ApiError::Unauthorized("invalid authorization header format"))?;

            let claims = verify_token(token, config.jwt_secret.as_bytes())
                .map_err(|_| ApiError::Unauthorized("invalid token"))?;

            Ok(AdminUser {
                admin_id: claims.sub,
            })
        })();
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            bind_addr: String::new(),
            jwt_secret: "test-jwt-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
        }
    }

    #[test]
    fn issued_access_token_verifies_with_the_same_secret() {
        let cfg = config();
        let admin_id = ObjectId::new();
        let (token, _) = generate_tokens(&admin_id, &cfg).unwrap();

        let claims = verify_token(&token, cfg.jwt_secret.as_bytes()).unwrap();
        assert_eq!(claims.sub, admin_id.to_string());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn access_token_is_rejected_by_the_refresh_secret() {
        let cfg = config();
        let (token, refresh) = generate_tokens(&ObjectId::new(), &cfg).unwrap();

        assert!(verify_token(&token, cfg.refresh_secret.as_bytes()).is_err());
        assert!(verify_token(&refresh, cfg.jwt_secret.as_bytes()).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let cfg = config();
        assert!(verify_token("not-a-token", cfg.jwt_secret.as_bytes()).is_err());
    }
}
