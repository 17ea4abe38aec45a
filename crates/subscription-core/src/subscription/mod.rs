//! Subscription-dialog core (RFC 6665, RFC 3515)
//!
//! - [`SingleSubscription`]: one event-package subscription and its state
//!   machine
//! - [`SubscriptionSet`]: the per-dialog container that matches, creates,
//!   dispatches to and reaps subscriptions

pub mod set;
pub mod single;

pub use set::SubscriptionSet;
pub use single::{Role, SingleSubscription, SubState};
