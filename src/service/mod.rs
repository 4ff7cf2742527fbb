//! Business workflows on top of the registry and repositories.

mod auth;
mod organization;
mod user;
mod validation;

pub use auth::{AuthResponse, AuthService, AuthUser, Credentials, Registration};
pub use organization::{generate_slug, CreateOrganization, OrganizationCreated, OrganizationService};
pub use user::{CoreProfile, CoreProfileUpdate, UserService};
pub use validation::RequestValidator;
