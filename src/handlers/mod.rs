//! HTTP handlers for auth, organizations and profiles.

pub mod auth;
pub mod organization;
pub mod user;
