//! Registration and login for core users and tenant users.

use super::RequestValidator;
use crate::error::{AppError, TenantError};
use crate::models::{CoreUser, NewTenantUser, TenantUser};
use crate::repository::{TenantUserRepository, UserRepository};
use crate::security::{create_core_token, create_tenant_token, hash_password, verify_password, TokenResponse, TokenScope};
use crate::state::AppState;
use crate::tenant::TenantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const INVALID_CREDENTIALS: &str = "invalid email or password";

#[derive(Clone, Debug, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    /// Only meaningful inside a tenant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_owner: Option<bool>,
}

impl From<&CoreUser> for AuthUser {
    fn from(u: &CoreUser) -> Self {
        AuthUser {
            id: u.id,
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            is_active: u.is_active,
            is_owner: None,
        }
    }
}

impl From<&TenantUser> for AuthUser {
    fn from(u: &TenantUser) -> Self {
        AuthUser {
            id: u.id,
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            is_active: u.is_active,
            is_owner: Some(u.is_owner),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthResponse {
    pub user: AuthUser,
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: TokenScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
}

impl AuthResponse {
    fn new(user: AuthUser, token: TokenResponse, scope: TokenScope, tenant_id: Option<TenantId>) -> Self {
        AuthResponse {
            user,
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            scope,
            tenant_id,
        }
    }
}

pub struct AuthService;

impl AuthService {
    pub async fn register_core(state: &AppState, input: Registration) -> Result<AuthResponse, AppError> {
        let email = RequestValidator::email(&input.email)?;
        RequestValidator::password(&input.password)?;
        RequestValidator::max_length("full_name", input.full_name.as_deref(), 255)?;

        let pool = state.core_pool()?;
        let users = UserRepository::new(&pool);
        if users.get_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(format!("user with email {} already exists", email)));
        }
        let hashed = hash_password(&input.password)?;
        let user = users.create(&email, &hashed, input.full_name.as_deref()).await?;
        tracing::info!(user_id = %user.id, "core user registered");

        let token = create_core_token(&state.settings.auth, user.id, &user.email)?;
        Ok(AuthResponse::new(AuthUser::from(&user), token, TokenScope::Core, None))
    }

    pub async fn login_core(state: &AppState, input: Credentials) -> Result<AuthResponse, AppError> {
        let email = input.email.trim().to_lowercase();
        let pool = state.core_pool()?;
        let user = UserRepository::new(&pool)
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;
        check_credentials(&input.password, &user.hashed_password, user.is_active)?;

        let token = create_core_token(&state.settings.auth, user.id, &user.email)?;
        Ok(AuthResponse::new(AuthUser::from(&user), token, TokenScope::Core, None))
    }

    /// Register a user inside `tenant_id`. The tenant must already be provisioned;
    /// an unknown tenant is reported as not found.
    pub async fn register_tenant(
        state: &AppState,
        tenant_id: &TenantId,
        input: Registration,
    ) -> Result<AuthResponse, AppError> {
        let email = RequestValidator::email(&input.email)?;
        RequestValidator::password(&input.password)?;
        RequestValidator::max_length("full_name", input.full_name.as_deref(), 255)?;
        RequestValidator::max_length("phone", input.phone.as_deref(), 50)?;
        RequestValidator::max_length("avatar_url", input.avatar_url.as_deref(), 500)?;

        let new_user = NewTenantUser {
            email,
            hashed_password: hash_password(&input.password)?,
            full_name: input.full_name,
            phone: input.phone,
            avatar_url: input.avatar_url,
            is_owner: false,
        };
        let user = state
            .registry
            .with_tenant(tenant_id, |pool| {
                let new_user = new_user.clone();
                async move {
                    if TenantUserRepository::get_by_email(&pool, &new_user.email).await?.is_some() {
                        return Err(AppError::Conflict(format!(
                            "user with email {} already exists in this tenant",
                            new_user.email
                        )));
                    }
                    TenantUserRepository::create(&pool, &new_user).await
                }
            })
            .await
            .map_err(tenant_not_found)?;
        tracing::info!(tenant_id = %tenant_id, user_id = %user.id, "tenant user registered");

        let token = create_tenant_token(&state.settings.auth, user.id, &user.email, tenant_id)?;
        Ok(AuthResponse::new(
            AuthUser::from(&user),
            token,
            TokenScope::Tenant,
            Some(tenant_id.clone()),
        ))
    }

    pub async fn login_tenant(
        state: &AppState,
        tenant_id: &TenantId,
        input: Credentials,
    ) -> Result<AuthResponse, AppError> {
        let email = input.email.trim().to_lowercase();
        let user = state
            .registry
            .with_tenant(tenant_id, |pool| {
                let email = email.clone();
                async move { TenantUserRepository::get_by_email(&pool, &email).await }
            })
            .await
            .map_err(tenant_not_found)?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;
        check_credentials(&input.password, &user.hashed_password, user.is_active)?;

        let token = create_tenant_token(&state.settings.auth, user.id, &user.email, tenant_id)?;
        Ok(AuthResponse::new(
            AuthUser::from(&user),
            token,
            TokenScope::Tenant,
            Some(tenant_id.clone()),
        ))
    }
}

fn check_credentials(password: &str, hashed: &str, is_active: bool) -> Result<(), AppError> {
    if !verify_password(password, hashed)? {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }
    if !is_active {
        return Err(AppError::Forbidden("user account is inactive".into()));
    }
    Ok(())
}

/// Login and registration name a tenant explicitly, so a missing tenant database is the
/// caller's mistake rather than an outage.
fn tenant_not_found(e: AppError) -> AppError {
    match e {
        AppError::Tenant(TenantError::TenantDatabaseUnavailable { tenant_id, reason }) => {
            tracing::debug!(tenant_id = %tenant_id, reason = %reason, "tenant lookup failed during auth");
            AppError::NotFound(format!("tenant {} not found", tenant_id))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_tenant_becomes_not_found() {
        let err = tenant_not_found(TenantError::unavailable("ghost", "database does not exist").into());
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("ghost")));
    }

    #[test]
    fn other_errors_pass_through() {
        let err = tenant_not_found(AppError::Conflict("dup".into()));
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn credentials_check_order() {
        let hashed = hash_password("right-password").unwrap();
        assert!(matches!(
            check_credentials("wrong", &hashed, true),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            check_credentials("right-password", &hashed, false),
            Err(AppError::Forbidden(_))
        ));
        assert!(check_credentials("right-password", &hashed, true).is_ok());
    }
}
