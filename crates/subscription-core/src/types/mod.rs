//! Parsed-message model and typed header values
//!
//! - [`Method`], [`SipRequest`], [`SipReply`]: the parsed structures the
//!   SIP stack hands to the subscription core
//! - [`Event`]: the Event header value (RFC 6665)
//! - [`SubscriptionStateHeader`]: the Subscription-State header value
//! - [`headers`]: raw header access and parameter utilities

pub mod event;
pub mod headers;
pub mod message;
pub mod method;
pub mod subscription_state;

pub use event::Event;
pub use headers::Header;
pub use message::{SipReply, SipRequest};
pub use method::Method;
pub use subscription_state::{StateToken, SubscriptionStateHeader};
