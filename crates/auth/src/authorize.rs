use thiserror::Error;

use crate::{Permission, Role, permissions_for};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("no role assigned")]
    NoRole,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Client-side permission gate for a role claim.
///
/// Used to hide or disable UI affordances. It is not a security boundary: the
/// backend re-checks every privileged request against a verified token.
///
/// - No IO
/// - No panics
pub fn authorize(role: Option<&Role>, required: &Permission) -> Result<(), AuthzError> {
    let role = role.ok_or(AuthzError::NoRole)?;

    let granted = permissions_for(role)
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
