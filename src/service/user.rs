//! Profiles: core accounts and tenant users.

use super::RequestValidator;
use crate::error::AppError;
use crate::models::{CoreUser, Organization, TenantProfileUpdate, TenantUser};
use crate::repository::{OrganizationRepository, TenantUserRepository, UserRepository};
use crate::state::AppState;
use crate::tenant::TenantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
pub struct CoreProfile {
    #[serde(flatten)]
    pub user: CoreUser,
    pub owned_organizations: Vec<Organization>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CoreProfileUpdate {
    pub full_name: Option<String>,
}

pub struct UserService;

impl UserService {
    pub async fn core_profile(state: &AppState, user_id: Uuid) -> Result<CoreProfile, AppError> {
        let pool = state.core_pool()?;
        let user = UserRepository::new(&pool)
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))?;
        let owned_organizations = OrganizationRepository::new(&pool).list_by_owner(user_id).await?;
        Ok(CoreProfile {
            user,
            owned_organizations,
        })
    }

    pub async fn update_core_profile(
        state: &AppState,
        user_id: Uuid,
        update: CoreProfileUpdate,
    ) -> Result<CoreProfile, AppError> {
        if let Some(full_name) = update.full_name.as_deref() {
            RequestValidator::max_length("full_name", Some(full_name), 255)?;
            let pool = state.core_pool()?;
            UserRepository::new(&pool)
                .update_full_name(user_id, full_name)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))?;
        }
        Self::core_profile(state, user_id).await
    }

    pub async fn tenant_profile(state: &AppState, tenant_id: &TenantId, user_id: Uuid) -> Result<TenantUser, AppError> {
        state
            .registry
            .with_tenant(tenant_id, |pool| async move { TenantUserRepository::get_by_id(&pool, user_id).await })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {} not found in tenant", user_id)))
    }

    /// Partial update; metadata keys are merged into the stored object rather than replacing it.
    pub async fn update_tenant_profile(
        state: &AppState,
        tenant_id: &TenantId,
        user_id: Uuid,
        update: TenantProfileUpdate,
    ) -> Result<TenantUser, AppError> {
        if update.is_empty() {
            return Self::tenant_profile(state, tenant_id, user_id).await;
        }
        RequestValidator::max_length("full_name", update.full_name.as_deref(), 255)?;
        RequestValidator::max_length("phone", update.phone.as_deref(), 50)?;
        RequestValidator::max_length("avatar_url", update.avatar_url.as_deref(), 500)?;
        let user = state
            .registry
            .with_tenant(tenant_id, |pool| {
                let update = update.clone();
                async move { TenantUserRepository::update_profile(&pool, user_id, &update).await }
            })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {} not found in tenant", user_id)))?;
        tracing::debug!(tenant_id = %tenant_id, user_id = %user_id, "tenant profile updated");
        Ok(user)
    }
}
