//! Settings validation: values that parse but cannot work together.

use crate::config::Settings;
use crate::error::ConfigError;
use jsonwebtoken::Algorithm;

pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if !matches!(
        settings.auth.algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    ) {
        return Err(ConfigError::Invalid {
            key: "ALGORITHM",
            message: "only HMAC algorithms (HS256, HS384, HS512) work with SECRET_KEY".into(),
        });
    }
    if settings.auth.access_token_expire_minutes <= 0 {
        return Err(ConfigError::Invalid {
            key: "ACCESS_TOKEN_EXPIRE_MINUTES",
            message: "must be positive".into(),
        });
    }
    if settings.pool.core_max_connections == 0 || settings.pool.tenant_max_connections == 0 {
        return Err(ConfigError::Invalid {
            key: "TENANT_DB_MAX_CONNECTIONS",
            message: "pool sizes must be at least 1".into(),
        });
    }
    if settings.pool.tenant_connect_timeout.is_zero() {
        return Err(ConfigError::Invalid {
            key: "TENANT_CONNECT_TIMEOUT_SECS",
            message: "must be at least 1 second".into(),
        });
    }
    if !settings.api_prefix.starts_with('/') {
        return Err(ConfigError::Invalid {
            key: "API_V1_PREFIX",
            message: format!("'{}' must start with '/'", settings.api_prefix),
        });
    }
    if axum::http::HeaderName::from_bytes(settings.tenant_header_name.as_bytes()).is_err() {
        return Err(ConfigError::Invalid {
            key: "TENANT_HEADER_NAME",
            message: format!("'{}' is not a valid header name", settings.tenant_header_name),
        });
    }
    if settings.core_database.is_empty() || settings.core_database.contains('/') {
        return Err(ConfigError::Invalid {
            key: "CORE_DB_NAME",
            message: format!("'{}' is not a database name", settings.core_database),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        Settings::from_lookup(|k| (k == "SECRET_KEY").then(|| "abc".to_string())).unwrap()
    }

    #[test]
    fn asymmetric_algorithms_are_rejected() {
        let mut s = base();
        s.auth.algorithm = Algorithm::RS256;
        assert!(validate(&s).is_err());
    }

    #[test]
    fn prefix_must_be_absolute() {
        let mut s = base();
        s.api_prefix = "api".into();
        assert!(matches!(validate(&s), Err(ConfigError::Invalid { key: "API_V1_PREFIX", .. })));
    }

    #[test]
    fn header_name_must_be_valid() {
        let mut s = base();
        s.tenant_header_name = "X Tenant".into();
        assert!(validate(&s).is_err());
    }
}
