//! Session lifecycle, refresh and navigation on top of the
//! auth crates.

pub mod lifecycle;
pub mod navigation;
pub mod synchronizer;

pub use lifecycle::{AuthState, LifecycleSnapshot, ResolutionRetry, SessionLifecycleController};
pub use navigation::{
    ChannelNavigator, Destination, NavigationDispatcher, Navigator, destination_for, destination_for_role,
};
pub use synchronizer::SessionSynchronizer;
