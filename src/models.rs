//! Row types for the core database (users, organizations) and tenant databases (users).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform-level user stored in the core database.
#[derive(Clone, Debug, Serialize, FromRow)]
pub struct CoreUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tenant registry row in the core database. `id` is the tenant identifier.
#[derive(Clone, Debug, Serialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub database_name: String,
    pub owner_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User inside one tenant database. Email is unique per tenant only.
#[derive(Clone, Debug, Serialize, FromRow)]
pub struct TenantUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub is_owner: bool,
    pub is_active: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewTenantUser {
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub is_owner: bool,
}

/// Partial tenant profile update; `None` leaves a field unchanged. Metadata is merged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TenantProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TenantProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone.is_none() && self.avatar_url.is_none() && self.metadata.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_never_serialize() {
        let now = Utc::now();
        let user = CoreUser {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            hashed_password: "$argon2id$secret".into(),
            full_name: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["email"], "a@example.com");
    }

    #[test]
    fn empty_profile_update() {
        assert!(TenantProfileUpdate::default().is_empty());
        let update = TenantProfileUpdate {
            phone: Some("555".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
