//! In-memory auth provider for tests/dev.
//!
//! Mirrors the behavior the core depends on: the authoritative role lives
//! server-side (the role directory), and the access token only reflects it
//! after a refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use tracing::{debug, info};
use uuid::Uuid;

use haulway_auth::{AccessClaims, AuthChange, Role, Session, SessionProvider};
use haulway_core::{CoreError, CoreResult, UserId};
use haulway_events::{EventBus, InMemoryEventBus, Subscription};

const SIGNING_SECRET: &[u8] = b"haulway-in-memory-provider";

#[derive(Debug, Default)]
struct State {
    current: Option<Arc<Session>>,
    roles: HashMap<UserId, Role>,
    fail_next_refresh: bool,
    refresh_count: u64,
    lookup_delay: Option<Duration>,
}

/// Auth provider double holding one session and a user → role directory.
pub struct InMemorySessionProvider {
    state: Mutex<State>,
    bus: InMemoryEventBus<AuthChange>,
    token_ttl: ChronoDuration,
}

impl InMemorySessionProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            bus: InMemoryEventBus::new(),
            token_ttl: ChronoDuration::hours(1),
        }
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| CoreError::provider("in-memory provider lock poisoned"))
    }

    /// Sign `user_id` in with a token reflecting their current directory role.
    ///
    /// Before any subscriber exists this is indistinguishable from a session
    /// persisted by a previous run.
    pub fn sign_in(&self, user_id: UserId) -> CoreResult<Arc<Session>> {
        let mut state = self.lock()?;
        let role = state.roles.get(&user_id).cloned();
        let session = Arc::new(self.mint(user_id, role, Utc::now())?);

        state.current = Some(Arc::clone(&session));
        self.publish(AuthChange::signed_in(Arc::clone(&session)));
        info!(user_id = %user_id, "in-memory sign-in");

        Ok(session)
    }

    /// Authoritative role write; the current token is left stale.
    pub fn grant_role(&self, user_id: UserId, role: Role) -> CoreResult<()> {
        self.lock()?.roles.insert(user_id, role);
        Ok(())
    }

    pub fn role_of(&self, user_id: &UserId) -> Option<Role> {
        self.lock().ok()?.roles.get(user_id).cloned()
    }

    /// Make the next `refresh_session` fail, as with a revoked refresh token.
    pub fn fail_next_refresh(&self) -> CoreResult<()> {
        self.lock()?.fail_next_refresh = true;
        Ok(())
    }

    /// Number of successful refreshes so far.
    pub fn refresh_count(&self) -> u64 {
        self.lock().map(|s| s.refresh_count).unwrap_or(0)
    }

    /// Replace the current access token with one that has already expired.
    /// No notification is published (time passing is silent), so a lifecycle
    /// controller already following this provider sees the new token only
    /// with the next notification.
    pub fn expire_session(&self) -> CoreResult<()> {
        let mut state = self.lock()?;
        let Some(current) = state.current.clone() else {
            return Ok(());
        };
        let role = state.roles.get(&current.user_id).cloned();
        let issued = Utc::now() - self.token_ttl - ChronoDuration::minutes(1);
        state.current = Some(Arc::new(self.mint(current.user_id, role, issued)?));
        Ok(())
    }

    /// Delay every `current_session` lookup. The returned session is the one
    /// current when the lookup *started*, like a slow storage read.
    pub fn set_lookup_delay(&self, delay: Option<Duration>) -> CoreResult<()> {
        self.lock()?.lookup_delay = delay;
        Ok(())
    }

    fn mint(&self, user_id: UserId, role: Option<Role>, issued_at: DateTime<Utc>) -> CoreResult<Session> {
        let claims = AccessClaims {
            sub: user_id,
            iat: issued_at,
            exp: issued_at + self.token_ttl,
            email: None,
            user_role: role,
        };
        let access_token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SIGNING_SECRET),
        )
        .map_err(|e| CoreError::provider(format!("cannot mint token: {e}")))?;

        Ok(Session {
            access_token,
            refresh_token: Uuid::new_v4().to_string(),
            user_id,
            expires_at: claims.exp,
        })
    }

    // Called with the state lock held so notification order matches the
    // order in which sessions were replaced.
    fn publish(&self, change: AuthChange) {
        if let Err(e) = self.bus.publish(change) {
            debug!(error = ?e, "dropping auth notification");
        }
    }
}

impl Default for InMemorySessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for InMemorySessionProvider {
    async fn current_session(&self) -> CoreResult<Option<Arc<Session>>> {
        let (snapshot, delay) = {
            let state = self.lock()?;
            (state.current.clone(), state.lookup_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    fn subscribe(&self) -> Subscription<AuthChange> {
        self.bus.subscribe()
    }

    async fn refresh_session(&self) -> CoreResult<Arc<Session>> {
        let mut state = self.lock()?;
        let Some(current) = state.current.clone() else {
            return Err(CoreError::refresh("no session to refresh"));
        };
        if state.fail_next_refresh {
            state.fail_next_refresh = false;
            return Err(CoreError::refresh("refresh token revoked"));
        }

        let role = state.roles.get(&current.user_id).cloned();
        let session = Arc::new(self.mint(current.user_id, role, Utc::now())?);
        state.current = Some(Arc::clone(&session));
        state.refresh_count += 1;
        self.publish(AuthChange::token_refreshed(Arc::clone(&session)));

        Ok(session)
    }

    async fn sign_out(&self) -> CoreResult<()> {
        let mut state = self.lock()?;
        state.current = None;
        self.publish(AuthChange::signed_out());
        Ok(())
    }
}
