//! Session refresh: mints a new access token so server-side role writes
//! become visible to the resolver.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use haulway_auth::{Session, SessionProvider, is_expiring_within};
use haulway_core::{CoreError, CoreResult};

pub struct SessionSynchronizer {
    provider: Arc<dyn SessionProvider>,
    // Refresh tokens rotate, so two refreshes must never present the same one.
    refresh_lock: Mutex<()>,
}

impl SessionSynchronizer {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            provider,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Mint a new access token from the current refresh token.
    ///
    /// Refreshes are serialized: every caller gets a token minted after its
    /// own call started. On failure the previous session stays in place and
    /// the error is returned for the caller to surface.
    pub async fn refresh_session(&self) -> CoreResult<Arc<Session>> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh only if the current token expires within `min_ttl_secs`.
    ///
    /// Concurrent callers racing on an expiring token cause one refresh; the
    /// others see the new token once the lock is released.
    pub async fn ensure_fresh(&self, min_ttl_secs: i64) -> CoreResult<Arc<Session>> {
        let _guard = self.refresh_lock.lock().await;

        let current = self
            .provider
            .current_session()
            .await?
            .ok_or(CoreError::Unauthenticated)?;

        if !is_expiring_within(&current.access_token, min_ttl_secs, Utc::now()) {
            debug!(user_id = %current.user_id, "access token still fresh");
            return Ok(current);
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> CoreResult<Arc<Session>> {
        match self.provider.refresh_session().await {
            Ok(session) => {
                info!(user_id = %session.user_id, expires_at = %session.expires_at, "session refreshed");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed; previous session kept");
                Err(e)
            }
        }
    }
}

impl core::fmt::Debug for SessionSynchronizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionSynchronizer").finish_non_exhaustive()
    }
}
