//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Failures of the tenant routing layer: context, registry, provisioning and migrations.
#[derive(Error, Debug)]
pub enum TenantError {
    #[error("tenant context is required but not set")]
    MissingTenantContext,
    #[error("tenant context used outside of a request scope")]
    ContextScopeMissing,
    #[error("invalid tenant id '{0}'")]
    InvalidTenantId(String),
    #[error("tenant header '{header}' does not match token tenant '{token}'")]
    TenantMismatch { header: String, token: String },
    #[error("tenant database unavailable for {tenant_id}: {reason}")]
    TenantDatabaseUnavailable { tenant_id: String, reason: String },
    #[error("core database unavailable: {0}")]
    CoreUnavailable(String),
    #[error("could not create database for tenant {tenant_id}: {source}")]
    ProvisioningFailed {
        tenant_id: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("migration {version} failed for tenant {tenant_id}: {source}")]
    MigrationFailed {
        tenant_id: String,
        version: i64,
        #[source]
        source: sqlx::Error,
    },
}

impl TenantError {
    pub fn unavailable(tenant_id: impl Into<String>, reason: impl ToString) -> Self {
        TenantError::TenantDatabaseUnavailable {
            tenant_id: tenant_id.into(),
            reason: reason.to_string(),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            TenantError::MissingTenantContext => (StatusCode::BAD_REQUEST, "missing_tenant_context"),
            TenantError::ContextScopeMissing => (StatusCode::INTERNAL_SERVER_ERROR, "context_scope_missing"),
            TenantError::InvalidTenantId(_) => (StatusCode::BAD_REQUEST, "invalid_tenant_id"),
            TenantError::TenantMismatch { .. } => (StatusCode::FORBIDDEN, "tenant_mismatch"),
            TenantError::TenantDatabaseUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "tenant_database_unavailable")
            }
            TenantError::CoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "core_unavailable"),
            TenantError::ProvisioningFailed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "provisioning_failed"),
            TenantError::MigrationFailed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "migration_failed"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Tenant(e) => e.status_and_code(),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// True when a unique constraint was violated (SQLSTATE 23505).
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_errors_map_to_expected_statuses() {
        let cases = [
            (AppError::from(TenantError::MissingTenantContext), StatusCode::BAD_REQUEST),
            (
                AppError::from(TenantError::TenantMismatch {
                    header: "a".into(),
                    token: "b".into(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::from(TenantError::unavailable("t1", "connection refused")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(TenantError::ProvisioningFailed {
                    tenant_id: "t1".into(),
                    source: sqlx::Error::PoolTimedOut,
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_code().0, expected, "{err}");
        }
    }

    #[test]
    fn unauthorized_response_carries_bearer_challenge() {
        let response = AppError::Unauthorized("bad token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[axum::http::header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn row_not_found_is_a_404() {
        let (status, code) = AppError::Db(sqlx::Error::RowNotFound).status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "not_found");
    }
}
