use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::{KnownRole, Role};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "moves.book"). The wildcard `"*"`
/// grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

const CUSTOMER: &[&str] = &[
    "inventory.read",
    "inventory.write",
    "moves.book",
    "moves.read",
    "payments.create",
];

const DRIVER: &[&str] = &[
    "jobs.read",
    "jobs.accept",
    "jobs.update_status",
    "moves.read",
];

const COMMERCIAL_CLIENT: &[&str] = &[
    "inventory.read",
    "inventory.write",
    "moves.book",
    "moves.book_bulk",
    "moves.read",
    "invoices.read",
    "payments.create",
];

const ADMIN: &[&str] = &["*"];

/// Static, ordered permission list for a known role.
pub fn permissions_for_known(role: KnownRole) -> &'static [&'static str] {
    match role {
        KnownRole::Customer => CUSTOMER,
        KnownRole::Driver => DRIVER,
        KnownRole::CommercialClient => COMMERCIAL_CLIENT,
        KnownRole::Admin => ADMIN,
    }
}

/// Ordered permissions granted by a role claim.
///
/// Unrecognized roles grant nothing.
pub fn permissions_for(role: &Role) -> Vec<Permission> {
    role.known()
        .map(permissions_for_known)
        .unwrap_or_default()
        .iter()
        .map(|p| Permission::new(*p))
        .collect()
}
