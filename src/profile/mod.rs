//! User profiles: onboarding, updates, and the HTTP surface over them.

pub mod model;
pub mod routes;
pub mod service;

pub use model::{NewUser, OnboardingStatus, ProfileUpdate, User};
pub use routes::{ProfileRouteState, profile_routes};
pub use service::ProfileService;
