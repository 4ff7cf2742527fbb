//! Tenant identifier: the routing key and the suffix of the tenant database name.

use crate::error::TenantError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every tenant database name.
pub const TENANT_DB_PREFIX: &str = "tenant_";

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENTIFIER_LEN: usize = 63;

/// Validated tenant identifier (in practice the organization UUID).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    pub fn new(raw: impl Into<String>) -> Result<Self, TenantError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && TENANT_DB_PREFIX.len() + trimmed.len() <= MAX_IDENTIFIER_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TenantError::InvalidTenantId(raw));
        }
        Ok(TenantId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Physical database name: `tenant_<id>`.
    pub fn database_name(&self) -> String {
        format!("{}{}", TENANT_DB_PREFIX, self.0)
    }
}

impl From<uuid::Uuid> for TenantId {
    fn from(id: uuid::Uuid) -> Self {
        TenantId(id.to_string())
    }
}

impl std::str::FromStr for TenantId {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantId::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TenantId::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_accepted() {
        let id = uuid::Uuid::new_v4();
        let tenant = TenantId::new(id.to_string()).unwrap();
        assert_eq!(tenant, TenantId::from(id));
        assert_eq!(tenant.database_name(), format!("tenant_{}", id));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(TenantId::new("  acme ").unwrap().as_str(), "acme");
    }

    #[test]
    fn rejects_empty_and_unsafe_ids() {
        for raw in ["", "   ", "a\"b", "a;drop", "with space", "slash/ed"] {
            assert!(
                matches!(TenantId::new(raw), Err(TenantError::InvalidTenantId(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_ids_that_overflow_database_names() {
        let limit = MAX_IDENTIFIER_LEN - TENANT_DB_PREFIX.len();
        assert!(TenantId::new("a".repeat(limit)).is_ok());
        assert!(TenantId::new("a".repeat(limit + 1)).is_err());
    }

    #[test]
    fn deserializes_with_validation() {
        let ok: TenantId = serde_json::from_str("\"t-1\"").unwrap();
        assert_eq!(ok.as_str(), "t-1");
        assert!(serde_json::from_str::<TenantId>("\"bad id\"").is_err());
    }
}
