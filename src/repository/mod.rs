//! Data access for core and tenant tables. Tenant repositories take the resolved tenant
//! pool explicitly; nothing here knows which tenant is current.

mod organization;
mod tenant_user;
mod user;

pub use organization::{NewOrganization, OrganizationRepository};
pub use tenant_user::TenantUserRepository;
pub use user::UserRepository;
