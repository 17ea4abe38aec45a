//! # sipevent-subscription-core
//!
//! The subscription-dialog core of the sipevent stack: per-dialog
//! containers of SIP event subscriptions and the per-subscription state
//! machine governing SUBSCRIBE/NOTIFY/REFER exchanges, per
//! [RFC 6665](https://datatracker.ietf.org/doc/html/rfc6665) (SIP events)
//! and [RFC 3515](https://datatracker.ietf.org/doc/html/rfc3515) (REFER).
//!
//! ## Overview
//!
//! The crate is structured around the following components:
//!
//! - **[`SubscriptionSet`]**: one per dialog; matches inbound/outbound
//!   requests to subscriptions by `(role, event, id)`, creates
//!   subscriptions on first contact, routes replies by CSeq, and reaps
//!   terminated subscriptions
//! - **[`SingleSubscription`]**: one subscription; owns the lifecycle
//!   state machine, the RFC 6665 Timer N and the expiry timer, and the
//!   dialog-usage accounting
//! - **Collaborator traits**: [`SubscriptionDialog`] (the enclosing
//!   dialog), [`TimerService`] (the application timer wheel),
//!   [`EventQueue`] (waking the owning session)
//! - **Parsed-message model**: [`SipRequest`], [`SipReply`] and the typed
//!   [`Event`] and [`SubscriptionStateHeader`] values
//!
//! Transport, transaction handling and full message parsing live in the
//! surrounding stack; this crate only consumes their parsed output.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sipevent_subscription_core::{
//!     SubscriptionSet, TimerSettings, TokioTimerService,
//! };
//! # use sipevent_subscription_core::SubscriptionDialog;
//! # fn dialog() -> Arc<dyn SubscriptionDialog> { unimplemented!() }
//!
//! # fn main() {
//! let timers = Arc::new(TokioTimerService::new());
//! let (wake_tx, _wake_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
//!
//! let mut subs = SubscriptionSet::new(
//!     dialog(),
//!     Some(Arc::new(wake_tx)),
//!     timers,
//!     TimerSettings::default(),
//! );
//! # let _ = &mut subs;
//! # }
//! ```
//!
//! The owning dialog then feeds `subs` from its four protocol hooks
//! (`on_request_in`, `on_request_sent`, `on_reply_in`, `on_reply_sent`)
//! and tears everything down with `terminate`.

pub mod dialog;
pub mod errors;
pub mod events;
pub mod subscription;
pub mod timer;
pub mod types;

pub use dialog::SubscriptionDialog;
pub use errors::{Result, SubscriptionError};
pub use events::EventQueue;
pub use subscription::{Role, SingleSubscription, SubState, SubscriptionSet};
pub use timer::{
    TimerHandler, TimerId, TimerKind, TimerService, TimerSettings, TokioTimerService,
};
pub use types::{Event, Header, Method, SipReply, SipRequest, StateToken, SubscriptionStateHeader};
