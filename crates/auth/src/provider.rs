use std::sync::Arc;

use async_trait::async_trait;

use haulway_core::CoreResult;
use haulway_events::Subscription;

use crate::{AuthChange, Session};

/// Client-side view of the auth provider's session API.
///
/// Contract for implementations:
///
/// - `current_session` is local (or cached); it never signs anyone in.
/// - `refresh_session` mints a new access token from the refresh token. On
///   success it replaces the session and publishes `TokenRefreshed`; on
///   failure the previous session stays in place.
/// - `sign_out` clears the session and publishes `SignedOut`.
/// - Notifications are published in the order sessions are replaced, and a
///   replacement is followed by its notification.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> CoreResult<Option<Arc<Session>>>;

    fn subscribe(&self) -> Subscription<AuthChange>;

    async fn refresh_session(&self) -> CoreResult<Arc<Session>>;

    async fn sign_out(&self) -> CoreResult<()>;
}
