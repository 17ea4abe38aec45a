//! The enclosing-dialog collaborator
//!
//! Subscriptions live inside a SIP dialog owned elsewhere. The core reaches
//! the dialog through this trait for exactly four things: dialog
//! identification (tags and route set, adopted from the first 2xx),
//! usage counting (the dialog stays alive while usages are non-zero),
//! and sending responses to inbound requests.

use crate::errors::Result;
use crate::types::{Header, SipRequest};

/// The subset of the enclosing dialog the subscription core consumes.
///
/// Implementations must be safe to call from the timer service's thread as
/// well as the SIP stack's worker threads; `dec_usages` in particular is
/// invoked from timer callbacks.
pub trait SubscriptionDialog: Send + Sync {
    /// The dialog's local tag
    fn local_tag(&self) -> String;

    /// The dialog's remote tag; empty before the dialog is established
    fn remote_tag(&self) -> String;

    /// Adopt the remote tag from a 2xx reply
    fn update_remote_tag(&self, tag: &str);

    /// Install the route set from a 2xx reply's Record-Route
    fn update_route_set(&self, route: &str);

    /// Add one usage to the dialog
    fn inc_usages(&self);

    /// Release one usage; the dialog may be destroyed once usages reach zero
    fn dec_usages(&self);

    /// Send a response to an inbound request through the dialog
    fn reply(
        &self,
        req: &SipRequest,
        code: u16,
        reason: &str,
        extra_headers: &[Header],
    ) -> Result<()>;
}
