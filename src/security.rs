//! Password hashing and access tokens.
//!
//! Tokens carry a `scope`: `core` tokens authenticate platform users against the core
//! database, `tenant` tokens authenticate a user inside one tenant database and name it
//! in `tenant_id`.

use crate::config::AuthSettings;
use crate::error::AppError;
use crate::tenant::TenantId;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub fn verify_password(password: &str, hashed: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, hashed).map_err(|e| AppError::Internal(format!("password verification failed: {}", e)))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Core,
    Tenant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub scope: TokenScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub fn create_core_token(auth: &AuthSettings, user_id: Uuid, email: &str) -> Result<TokenResponse, AppError> {
    issue(auth, user_id, email, TokenScope::Core, None)
}

pub fn create_tenant_token(
    auth: &AuthSettings,
    user_id: Uuid,
    email: &str,
    tenant_id: &TenantId,
) -> Result<TokenResponse, AppError> {
    issue(auth, user_id, email, TokenScope::Tenant, Some(tenant_id.to_string()))
}

fn issue(
    auth: &AuthSettings,
    user_id: Uuid,
    email: &str,
    scope: TokenScope,
    tenant_id: Option<String>,
) -> Result<TokenResponse, AppError> {
    let now = Utc::now().timestamp();
    let expires_in = auth.access_token_expire_minutes * 60;
    let claims = Claims {
        user_id,
        email: email.to_string(),
        scope,
        tenant_id,
        exp: now + expires_in,
        iat: now,
        token_type: "access".to_string(),
    };
    let access_token = jsonwebtoken::encode(
        &Header::new(auth.algorithm),
        &claims,
        &EncodingKey::from_secret(auth.secret_key.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token encoding failed: {}", e)))?;
    Ok(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in,
    })
}

/// Verify signature and expiry. Every failure is `Unauthorized`.
pub fn decode_token(auth: &AuthSettings, token: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(auth.algorithm);
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret_key.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthorized("token has expired".into()),
        _ => AppError::Unauthorized("could not validate credentials".into()),
    })?;
    if data.claims.token_type != "access" {
        return Err(AppError::Unauthorized("not an access token".into()));
    }
    Ok(data.claims)
}
