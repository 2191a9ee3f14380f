use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role claim value as carried in an access token.
///
/// Kept as an opaque string so a token minted by a newer backend (with a role
/// this client does not know yet) still decodes. Use [`Role::known`] to match
/// exhaustively over the roles this client understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const CUSTOMER: Role = Role(Cow::Borrowed("customer"));
    pub const DRIVER: Role = Role(Cow::Borrowed("driver"));
    pub const COMMERCIAL_CLIENT: Role = Role(Cow::Borrowed("commercial_client"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The closed-set role this value names, if any.
    pub fn known(&self) -> Option<KnownRole> {
        KnownRole::from_wire(self.as_str())
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<KnownRole> for Role {
    fn from(value: KnownRole) -> Self {
        value.role()
    }
}

/// Roles this client can request and route on.
///
/// Wire strings are stable; adding a variant is a client release, while the
/// backend may introduce roles at any time (see [`Role`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownRole {
    Customer,
    Driver,
    CommercialClient,
    Admin,
}

impl KnownRole {
    pub const ALL: [KnownRole; 4] = [
        KnownRole::Customer,
        KnownRole::Driver,
        KnownRole::CommercialClient,
        KnownRole::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            KnownRole::Customer => "customer",
            KnownRole::Driver => "driver",
            KnownRole::CommercialClient => "commercial_client",
            KnownRole::Admin => "admin",
        }
    }

    pub fn role(self) -> Role {
        Role(Cow::Borrowed(self.as_str()))
    }

    fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl core::fmt::Display for KnownRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for KnownRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);
