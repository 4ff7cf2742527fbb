//! Bearer-token principals.

use crate::context::TenantContext;
use crate::error::{AppError, TenantError};
use crate::security::{decode_token, Claims, TokenScope};
use crate::state::AppState;
use crate::tenant::TenantId;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

fn bearer_claims(parts: &Parts, state: &AppState) -> Result<Claims, AppError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
    let token = match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => token.trim(),
        _ => return Err(AppError::Unauthorized("malformed authorization header".into())),
    };
    decode_token(&state.settings.auth, token)
}

/// A platform user authenticated with a `core` token.
#[derive(Clone, Debug)]
pub struct CoreAuth {
    pub user_id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CoreAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if claims.scope != TokenScope::Core {
            return Err(AppError::Forbidden("core access token required".into()));
        }
        Ok(CoreAuth {
            user_id: claims.user_id,
            email: claims.email,
        })
    }
}

/// A tenant user authenticated with a `tenant` token.
///
/// The token's tenant must agree with the tenant header when both are present. With no
/// header, the token's tenant is bound to the request context.
#[derive(Clone, Debug)]
pub struct TenantAuth {
    pub user_id: Uuid,
    pub email: String,
    pub tenant_id: TenantId,
}

#[async_trait]
impl FromRequestParts<AppState> for TenantAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if claims.scope != TokenScope::Tenant {
            return Err(AppError::Forbidden("tenant access token required".into()));
        }
        let token_tenant = claims
            .tenant_id
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("tenant token carries no tenant".into()))
            .and_then(|raw| TenantId::new(raw).map_err(|_| AppError::Unauthorized("tenant token carries an invalid tenant".into())))?;
        tenant_agreement(TenantContext::get(), &token_tenant)?;
        if !TenantContext::is_set() {
            TenantContext::set(token_tenant)?;
        }
        Ok(TenantAuth {
            user_id: claims.user_id,
            email: claims.email,
            tenant_id: TenantContext::require()?,
        })
    }
}

fn tenant_agreement(header: Option<TenantId>, token: &TenantId) -> Result<(), TenantError> {
    match header {
        Some(header) if &header != token => Err(TenantError::TenantMismatch {
            header: header.to_string(),
            token: token.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::security::create_tenant_token;
    use axum::http::Request;

    fn state() -> AppState {
        AppState::new(Settings::from_lookup(|k| (k == "SECRET_KEY").then(|| "test".to_string())).unwrap())
    }

    fn parts_with_token(token: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn token_tenant_becomes_the_request_tenant() {
        let state = state();
        let acme = TenantId::new("acme").unwrap();
        let token = create_tenant_token(&state.settings.auth, Uuid::new_v4(), "a@example.com", &acme).unwrap();
        let mut parts = parts_with_token(&token.access_token);

        let (auth, bound) = TenantContext::scope(None, async {
            let auth = TenantAuth::from_request_parts(&mut parts, &state).await.unwrap();
            (auth, TenantContext::get())
        })
        .await;
        assert_eq!(auth.tenant_id, acme);
        assert_eq!(bound, Some(acme));
    }

    #[tokio::test]
    async fn tenant_token_outside_a_request_scope_is_rejected() {
        let state = state();
        let acme = TenantId::new("acme").unwrap();
        let token = create_tenant_token(&state.settings.auth, Uuid::new_v4(), "a@example.com", &acme).unwrap();
        let mut parts = parts_with_token(&token.access_token);

        let err = TenantAuth::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Tenant(TenantError::ContextScopeMissing)));
    }

    #[test]
    fn header_and_token_must_agree() {
        let a = TenantId::new("a").unwrap();
        let b = TenantId::new("b").unwrap();
        assert!(tenant_agreement(None, &a).is_ok());
        assert!(tenant_agreement(Some(a.clone()), &a).is_ok());
        assert!(matches!(
            tenant_agreement(Some(b), &a),
            Err(TenantError::TenantMismatch { ref header, ref token }) if header == "b" && token == "a"
        ));
    }
}
