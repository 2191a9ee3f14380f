//! Infrastructure layer: configuration, the auth provider and the
//! role-assignment service.

pub mod config;
pub mod gotrue;
pub mod in_memory;
pub mod role_assignment;

pub use config::AuthConfig;
pub use gotrue::GoTrueSessionProvider;
pub use in_memory::InMemorySessionProvider;
pub use role_assignment::{ASSIGN_ROLE_PATH, RoleAssignmentClient};
