//! Session lifecycle state machine.
//!
//! One consumer task owns the state. It reads provider notifications in the
//! order they were published and lands a new [`AuthState`] for each. Role
//! resolution suspends, so every notification (and every role submission)
//! takes a new generation number; a resolution landing under a generation
//! that is no longer current is discarded. Navigation is dispatched only when
//! the landed state differs from the previously landed one.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use haulway_auth::{AuthChange, KnownRole, Role, RoleResolver, Session, SessionProvider};
use haulway_core::{CoreError, CoreResult};
use haulway_events::Subscription;
use haulway_infra::RoleAssignmentClient;

use crate::{NavigationDispatcher, Navigator, SessionSynchronizer};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    AuthenticatedNoRole,
    AuthenticatedWithRole(Role),
}

impl AuthState {
    pub fn for_role(role: Option<Role>) -> Self {
        match role {
            Some(role) => AuthState::AuthenticatedWithRole(role),
            None => AuthState::AuthenticatedNoRole,
        }
    }

    pub fn role(&self) -> Option<&Role> {
        match self {
            AuthState::AuthenticatedWithRole(role) => Some(role),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthState::Unauthenticated)
    }
}

/// Read-only view of the controller, published on every landing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LifecycleSnapshot {
    pub state: AuthState,
    pub session: Option<Arc<Session>>,
    /// False until the session store has been queried and a state landed.
    pub initialized: bool,
    pub generation: u64,
}

impl LifecycleSnapshot {
    /// Pre-query interval. Not the same as `Unauthenticated`.
    pub fn is_loading(&self) -> bool {
        !self.initialized
    }
}

/// Re-resolution policy after a successful role assignment.
///
/// A refresh issued before the backend has committed the role yields a token
/// without it. With `attempts > 1` the refresh-then-resolve step is repeated,
/// sleeping `delay` in between, before giving up with `RolePending`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResolutionRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl ResolutionRetry {
    pub const fn once() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

impl Default for ResolutionRetry {
    fn default() -> Self {
        Self::once()
    }
}

struct Landing {
    generation: u64,
    state: AuthState,
    session: Option<Arc<Session>>,
}

type PendingResolution = Pin<Box<dyn Future<Output = Option<Landing>> + Send>>;

#[derive(Default)]
struct Inner {
    generation: u64,
    landed: Option<AuthState>,
}

struct Shared {
    provider: Arc<dyn SessionProvider>,
    resolver: RoleResolver,
    dispatcher: NavigationDispatcher,
    inner: Mutex<Inner>,
    snapshots: watch::Sender<LifecycleSnapshot>,
}

impl Shared {
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        let mut inner = self.inner();
        inner.generation += 1;
        inner.generation
    }

    fn current_generation(&self) -> u64 {
        self.inner().generation
    }

    /// Apply a landing unless it has been superseded. Returns whether it was
    /// applied.
    fn land(&self, landing: Landing) -> bool {
        let mut inner = self.inner();
        if landing.generation != inner.generation {
            debug!(
                generation = landing.generation,
                current = inner.generation,
                "discarding superseded resolution"
            );
            return false;
        }
        self.apply(&mut inner, landing);
        true
    }

    /// Land `state` under a fresh generation, provided nothing has been
    /// observed since `observed` was read.
    fn land_if_unchanged(&self, observed: u64, state: AuthState, session: Arc<Session>) -> bool {
        let mut inner = self.inner();
        if inner.generation != observed {
            debug!(observed, current = inner.generation, "newer observation pending; not landing");
            return false;
        }
        inner.generation += 1;
        let generation = inner.generation;
        self.apply(
            &mut inner,
            Landing {
                generation,
                state,
                session: Some(session),
            },
        );
        true
    }

    fn apply(&self, inner: &mut Inner, landing: Landing) {
        let changed = inner.landed.as_ref() != Some(&landing.state);
        if changed {
            info!(generation = landing.generation, state = ?landing.state, "session state changed");
            // Dispatch under the lock so navigation order matches landing order.
            self.dispatcher.dispatch(&landing.state);
            inner.landed = Some(landing.state.clone());
        }

        self.snapshots.send_replace(LifecycleSnapshot {
            state: landing.state,
            session: landing.session,
            initialized: true,
            generation: landing.generation,
        });
    }

    /// Start handling a session observation. Absence lands immediately;
    /// presence needs a role lookup, returned as a pending future.
    ///
    /// The role is read from the observed session, and only once the
    /// provider confirms that session is still current. If it has moved on,
    /// the resolution yields nothing: the notification for the newer session
    /// is already on its way.
    fn observe(&self, session: Option<Arc<Session>>) -> Option<PendingResolution> {
        let generation = self.next_generation();

        let Some(session) = session else {
            self.land(Landing {
                generation,
                state: AuthState::Unauthenticated,
                session: None,
            });
            return None;
        };

        let provider = Arc::clone(&self.provider);
        Some(Box::pin(async move {
            match provider.current_session().await {
                Ok(Some(current)) if current == session => {}
                Ok(_) => {
                    debug!(generation, "session replaced during role lookup; awaiting its notification");
                    return None;
                }
                Err(e) => warn!(error = %e, "session lookup failed; resolving the observed session"),
            }
            Some(Landing {
                generation,
                state: AuthState::for_role(RoleResolver::role_for_session(&session)),
                session: Some(session),
            })
        }))
    }
}

async fn run(shared: Arc<Shared>, mut changes: Subscription<AuthChange>) {
    let initial = match shared.provider.current_session().await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "initial session lookup failed; starting signed out");
            None
        }
    };
    let mut pending = shared.observe(initial);

    loop {
        tokio::select! {
            biased;

            change = changes.recv() => {
                let Some(change) = change else {
                    debug!("auth notification stream closed");
                    break;
                };
                debug!(event = ?change.event, "auth notification");
                // A newer observation replaces any in-flight resolution.
                pending = shared.observe(change.session);
            }

            landing = async {
                match pending.as_mut() {
                    Some(resolution) => resolution.await,
                    None => std::future::pending().await,
                }
            } => {
                pending = None;
                if let Some(landing) = landing {
                    shared.land(landing);
                }
            }
        }
    }
}

/// Owns the session state and drives navigation from it.
pub struct SessionLifecycleController {
    shared: Arc<Shared>,
    assignment: RoleAssignmentClient,
    synchronizer: SessionSynchronizer,
    retry: ResolutionRetry,
    consumer: JoinHandle<()>,
}

impl SessionLifecycleController {
    /// Subscribe to `provider`, then query its current session once and keep
    /// following notifications on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        provider: Arc<dyn SessionProvider>,
        assignment: RoleAssignmentClient,
        navigator: Arc<dyn Navigator>,
        retry: ResolutionRetry,
    ) -> Self {
        // Subscribe before the initial query so nothing published in between is lost.
        let changes = provider.subscribe();
        let (snapshots, _) = watch::channel(LifecycleSnapshot::default());

        let shared = Arc::new(Shared {
            resolver: RoleResolver::new(Arc::clone(&provider)),
            dispatcher: NavigationDispatcher::new(navigator),
            provider: Arc::clone(&provider),
            inner: Mutex::new(Inner::default()),
            snapshots,
        });

        let consumer = tokio::spawn(run(Arc::clone(&shared), changes));

        Self {
            shared,
            assignment,
            synchronizer: SessionSynchronizer::new(provider),
            retry,
            consumer,
        }
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    pub fn state(&self) -> AuthState {
        self.shared.snapshots.borrow().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.shared.resolver
    }

    pub fn synchronizer(&self) -> &SessionSynchronizer {
        &self.synchronizer
    }

    /// Role-selection flow: assign `role`, refresh, re-resolve.
    ///
    /// On success the controller lands `AuthenticatedWithRole` and the
    /// resolved role is returned. Any failure leaves the state as it was and
    /// is returned for the UI to offer a retry.
    pub async fn submit_role(&self, role: KnownRole) -> CoreResult<Role> {
        let session = self
            .shared
            .provider
            .current_session()
            .await?
            .ok_or(CoreError::Unauthenticated)?;

        self.assignment.assign_role(&session.user_id, role).await?;

        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            let observed = self.shared.current_generation();
            let refreshed = self.synchronizer.refresh_session().await?;

            match RoleResolver::role_for_session(&refreshed) {
                Some(resolved) => {
                    info!(user_id = %refreshed.user_id, role = %resolved, attempt, "role visible after refresh");
                    // If the refresh notification was already consumed, the
                    // consumer lands the same state itself.
                    self.shared.land_if_unchanged(
                        observed,
                        AuthState::AuthenticatedWithRole(resolved.clone()),
                        refreshed,
                    );
                    return Ok(resolved);
                }
                None if attempt < attempts => {
                    debug!(user_id = %refreshed.user_id, attempt, "assigned role not visible yet; retrying");
                    tokio::time::sleep(self.retry.delay).await;
                }
                None => {}
            }
        }

        warn!(user_id = %session.user_id, role = %role, attempts, "assigned role not visible after refresh");
        Err(CoreError::RolePending)
    }

    /// Sign out through the provider; its `SignedOut` notification drives the
    /// transition.
    pub async fn sign_out(&self) -> CoreResult<()> {
        self.shared.provider.sign_out().await
    }

    /// Stop following notifications. The last snapshot stays readable.
    pub fn shutdown(&self) {
        self.consumer.abort();
    }
}

impl Drop for SessionLifecycleController {
    fn drop(&mut self) {
        self.consumer.abort();
    }
}

impl core::fmt::Debug for SessionLifecycleController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionLifecycleController")
            .field("snapshot", &self.snapshot())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
