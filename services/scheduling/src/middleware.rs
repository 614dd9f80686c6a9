//! Authentication middleware for JWT token validation

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::ApiError, guard::Actor, state::AppState};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User roles
    pub roles: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub roles: Vec<String>,
}

/// Key material for verifying access tokens
#[derive(Debug, Clone)]
pub enum JwtKey {
    /// RS256 public key in PEM form
    RsaPublicPem(String),
    /// HS256 shared secret
    Secret(String),
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub key: JwtKey,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// `JWT_PUBLIC_KEY` (PEM or a path to a PEM file) wins over `JWT_SECRET`.
    pub fn from_env() -> Result<Self, String> {
        if let Ok(public_key) = env::var("JWT_PUBLIC_KEY") {
            let public_key = if public_key.starts_with("-----BEGIN") {
                public_key
            } else {
                std::fs::read_to_string(&public_key)
                    .map_err(|e| format!("Failed to read public key file: {}", e))?
                    .trim()
                    .to_string()
            };
            return Ok(JwtConfig {
                key: JwtKey::RsaPublicPem(public_key),
            });
        }

        let secret = env::var("JWT_SECRET")
            .map_err(|_| "Neither JWT_PUBLIC_KEY nor JWT_SECRET is set".to_string())?;
        if secret.is_empty() {
            return Err("JWT_SECRET is empty".to_string());
        }

        Ok(JwtConfig {
            key: JwtKey::Secret(secret),
        })
    }
}

/// Verifies bearer tokens; built once at start-up
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &JwtConfig) -> Result<Self, jsonwebtoken::errors::Error> {
        let (key, algorithm) = match &config.key {
            JwtKey::RsaPublicPem(pem) => (DecodingKey::from_rsa_pem(pem.as_bytes())?, Algorithm::RS256),
            JwtKey::Secret(secret) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;

        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                ApiError::Unauthorized
            })
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or_else(|| {
        warn!("Request to {} without bearer token", req.uri().path());
        ApiError::Unauthorized
    })?;

    let claims = state.verifier.verify(bearer.token())?;

    let user = AuthUser {
        id: claims.sub,
        roles: claims.roles,
    };

    // Insert the user into the request extensions
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthUser>()
            .ok_or(ApiError::Unauthorized)?;
        Actor::try_from(user)
    }
}
