//! Waking the owning session
//!
//! When a lifecycle timer terminates a subscription, the owning session is
//! asleep in its own event loop and must be poked to observe the state
//! change. The poke carries no payload; the session re-examines its
//! subscriptions when it wakes.

use tokio::sync::mpsc;

/// Wake target for timer-driven terminations.
pub trait EventQueue: Send + Sync {
    /// Post a wake to the owning session. Must not block.
    fn post_wake(&self);
}

/// A session that selects on an unbounded channel can hand the sender
/// straight to the subscription set.
impl EventQueue for mpsc::UnboundedSender<()> {
    fn post_wake(&self) {
        // The session being gone is fine; the wake is best-effort.
        let _ = self.send(());
    }
}
