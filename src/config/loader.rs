//! Load settings from the environment (`.env` honoured via dotenvy).

use crate::config::types::{AuthSettings, DatabaseServer, PoolSettings, Settings};
use crate::error::ConfigError;
use jsonwebtoken::Algorithm;
use std::str::FromStr;
use std::time::Duration;

impl Settings {
    /// Read settings from process environment after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Tenant server values default to the core server's.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let core_server = DatabaseServer {
            host: get("CORE_DB_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_or(&get, "CORE_DB_PORT", 5432u16)?,
            user: get("CORE_DB_USER").unwrap_or_else(|| "postgres".into()),
            password: get("CORE_DB_PASSWORD").unwrap_or_default(),
        };
        let tenant_server = DatabaseServer {
            host: get("TENANT_DB_HOST").unwrap_or_else(|| core_server.host.clone()),
            port: parse_or(&get, "TENANT_DB_PORT", core_server.port)?,
            user: get("TENANT_DB_USER").unwrap_or_else(|| core_server.user.clone()),
            password: get("TENANT_DB_PASSWORD").unwrap_or_else(|| core_server.password.clone()),
        };

        let defaults = PoolSettings::default();
        let pool = PoolSettings {
            core_max_connections: parse_or(&get, "CORE_DB_MAX_CONNECTIONS", defaults.core_max_connections)?,
            tenant_max_connections: parse_or(&get, "TENANT_DB_MAX_CONNECTIONS", defaults.tenant_max_connections)?,
            tenant_connect_timeout: Duration::from_secs(parse_or(
                &get,
                "TENANT_CONNECT_TIMEOUT_SECS",
                defaults.tenant_connect_timeout.as_secs(),
            )?),
            statement_timeout: Duration::from_millis(parse_or(
                &get,
                "STATEMENT_TIMEOUT_MS",
                defaults.statement_timeout.as_millis() as u64,
            )?),
            idle_timeout: Duration::from_secs(parse_or(&get, "DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout.as_secs())?),
        };

        let algorithm_raw = get("ALGORITHM").unwrap_or_else(|| "HS256".into());
        let algorithm = Algorithm::from_str(&algorithm_raw).map_err(|e| ConfigError::Invalid {
            key: "ALGORITHM",
            message: e.to_string(),
        })?;
        let auth = AuthSettings {
            secret_key: get("SECRET_KEY").ok_or(ConfigError::Missing("SECRET_KEY"))?,
            algorithm,
            access_token_expire_minutes: parse_or(&get, "ACCESS_TOKEN_EXPIRE_MINUTES", 30i64)?,
        };

        let settings = Settings {
            app_name: get("APP_NAME").unwrap_or_else(|| "tenant-router".into()),
            api_prefix: get("API_V1_PREFIX").unwrap_or_else(|| "/api/v1".into()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into()),
            core_server,
            core_database: get("CORE_DB_NAME").unwrap_or_else(|| "core".into()),
            tenant_server,
            admin_database: get("TENANT_ADMIN_DB").unwrap_or_else(|| "postgres".into()),
            pool,
            auth,
            tenant_header_name: get("TENANT_HEADER_NAME").unwrap_or_else(|| "X-Tenant-Id".into()),
        };
        crate::config::validate(&settings)?;
        Ok(settings)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: format!("'{}': {}", raw, e),
        }),
    }
}
