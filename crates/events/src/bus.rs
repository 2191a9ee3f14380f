//! Publish/subscribe abstraction (mechanics only).
//!
//! The bus distributes notifications to every live subscriber. It is used for
//! session-change notifications, where order matters: a consumer that applies
//! a sign-in after a later sign-out would show a signed-in UI to a
//! signed-out user.
//!
//! ## Delivery guarantees
//!
//! - **Broadcast**: every subscription receives every message published after
//!   it was created.
//! - **Ordered per bus**: messages arrive in the order `publish` was called.
//!   Implementations must serialize publication to uphold this.
//! - **Unbounded**: `publish` never waits on a slow consumer. Consumers are
//!   expected to drain promptly.
//! - **No persistence**: a subscription created after a publish does not see
//!   it. Consumers query current state once after subscribing.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

/// A subscription to a notification stream.
///
/// ## Usage pattern
///
/// ```ignore
/// let mut subscription = bus.subscribe();
/// while let Some(change) = subscription.recv().await {
///     apply(change);
/// }
/// // bus dropped: stream is over
/// ```
///
/// A subscription has exactly one consumer; hand it to a single task.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Transport-agnostic pub/sub bus.
///
/// `Send + Sync` so one bus can be shared between the auth provider (the
/// publisher) and any number of consumers.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
