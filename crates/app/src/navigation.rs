//! Mapping from session state to the screen the UI should show.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use haulway_auth::{KnownRole, Role};

use crate::AuthState;

/// Top-level screens the session core routes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    SignIn,
    RoleSelection,
    CustomerHome,
    DriverJobs,
    CommercialDashboard,
    AdminConsole,
}

impl Destination {
    /// Lowest-privilege landing screen, used for roles this client does not know.
    pub const DEFAULT_FOR_UNKNOWN_ROLE: Destination = Destination::CustomerHome;

    pub fn route(self) -> &'static str {
        match self {
            Destination::SignIn => "/sign-in",
            Destination::RoleSelection => "/onboarding/role",
            Destination::CustomerHome => "/customer",
            Destination::DriverJobs => "/driver/jobs",
            Destination::CommercialDashboard => "/commercial",
            Destination::AdminConsole => "/admin",
        }
    }
}

impl core::fmt::Display for Destination {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.route())
    }
}

pub fn destination_for_role(role: Option<&Role>) -> Destination {
    let Some(role) = role else {
        return Destination::RoleSelection;
    };

    match role.known() {
        Some(KnownRole::Customer) => Destination::CustomerHome,
        Some(KnownRole::Driver) => Destination::DriverJobs,
        Some(KnownRole::CommercialClient) => Destination::CommercialDashboard,
        Some(KnownRole::Admin) => Destination::AdminConsole,
        None => {
            warn!(role = %role, "unrecognized role; routing to default destination");
            Destination::DEFAULT_FOR_UNKNOWN_ROLE
        }
    }
}

pub fn destination_for(state: &AuthState) -> Destination {
    match state {
        AuthState::Unauthenticated => Destination::SignIn,
        AuthState::AuthenticatedNoRole => Destination::RoleSelection,
        AuthState::AuthenticatedWithRole(role) => destination_for_role(Some(role)),
    }
}

/// UI-side navigation hook. One call is one navigation action.
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: Destination);
}

/// Forwards destinations to a UI loop over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: UnboundedSender<Destination>,
}

impl ChannelNavigator {
    pub fn channel() -> (Self, UnboundedReceiver<Destination>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, destination: Destination) {
        if self.tx.send(destination).is_err() {
            debug!(%destination, "navigation receiver gone; dropping");
        }
    }
}

#[derive(Clone)]
pub struct NavigationDispatcher {
    navigator: Arc<dyn Navigator>,
}

impl NavigationDispatcher {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self { navigator }
    }

    /// Route to the screen for `state`. Performs exactly one navigation.
    pub fn dispatch(&self, state: &AuthState) -> Destination {
        let destination = destination_for(state);
        info!(%destination, "navigating");
        self.navigator.navigate(destination);
        destination
    }
}

impl core::fmt::Debug for NavigationDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NavigationDispatcher").finish_non_exhaustive()
    }
}
