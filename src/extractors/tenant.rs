//! Tenant extractor. The tenant-context middleware has already parsed the tenant
//! header into the request's [`TenantContext`]; this reads it back.

use crate::context::TenantContext;
use crate::tenant::TenantId;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Tenant bound to this request, if any.
#[derive(Clone, Debug)]
pub struct OptionalTenant(pub Option<TenantId>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalTenant
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalTenant(TenantContext::get()))
    }
}
