//! Request extractors: tenant from the request context, bearer-token principals.

pub mod auth;
pub mod tenant;

pub use auth::{CoreAuth, TenantAuth};
pub use tenant::OptionalTenant;
