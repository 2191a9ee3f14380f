//! Role model, access-token claims and client-side role
//! resolution.
//!
//! This crate is decoupled from HTTP: the auth provider is reached through the
//! [`SessionProvider`] trait, implemented in `haulway-infra`.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod provider;
pub mod resolver;
pub mod roles;
pub mod session;
pub mod token;

pub use authorize::{AuthzError, authorize};
pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use permissions::{Permission, permissions_for, permissions_for_known};
pub use provider::SessionProvider;
pub use resolver::RoleResolver;
pub use roles::{KnownRole, Role, UnknownRole};
pub use session::{AuthChange, AuthEvent, Session};
pub use token::{TokenDecodeError, decode_claims, decode_role, is_expiring_within, seconds_until_expiry};
