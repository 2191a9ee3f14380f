//! Role resolution from the current session.

use std::sync::Arc;

use tracing::warn;

use crate::{Permission, Role, Session, SessionProvider, decode_role, permissions_for};

/// Reads the role claim out of whatever session the provider currently holds.
///
/// Read-only and side-effect free; safe to call concurrently. The only
/// suspension point is the provider's session lookup, the decode is local.
#[derive(Clone)]
pub struct RoleResolver {
    provider: Arc<dyn SessionProvider>,
}

impl RoleResolver {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    /// Role claim of the current session, or `None`.
    ///
    /// Provider and decode failures are logged and reported as `None`.
    pub async fn resolve_role(&self) -> Option<Role> {
        match self.provider.current_session().await {
            Ok(Some(session)) => Self::role_for_session(&session),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "session lookup failed during role resolution");
                None
            }
        }
    }

    /// Role claim of a session already in hand (no lookup).
    pub fn role_for_session(session: &Session) -> Option<Role> {
        decode_role(Some(&session.access_token))
    }

    /// `true` iff the resolved role equals `expected`.
    ///
    /// A UI gate, not an enforcement point.
    pub async fn has_role(&self, expected: &Role) -> bool {
        self.resolve_role().await.as_ref() == Some(expected)
    }

    /// Ordered permissions of the resolved role; empty for no or unknown role.
    pub async fn permissions_for_current_role(&self) -> Vec<Permission> {
        self.resolve_role()
            .await
            .map(|role| permissions_for(&role))
            .unwrap_or_default()
    }
}

impl core::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleResolver").finish_non_exhaustive()
    }
}
