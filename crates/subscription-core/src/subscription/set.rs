//! The per-dialog collection of subscriptions
//!
//! A [`SubscriptionSet`] owns every subscription living inside one dialog
//! and routes protocol events to the right one: inbound/outbound requests
//! are matched by `(role, event, id)`, replies by the CSeq recorded when
//! their transaction started. A first SUBSCRIBE or REFER with no match
//! creates a subscription; a terminated one is reaped lazily on the next
//! match attempt.
//!
//! The set is not internally synchronized: it belongs to the owning
//! dialog's serialisation domain and is driven by one logical owner at a
//! time. The subscriptions themselves carry their own state locks, so the
//! timer service may terminate them concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};

use crate::dialog::SubscriptionDialog;
use crate::events::EventQueue;
use crate::timer::{TimerService, TimerSettings};
use crate::types::headers;
use crate::types::{Event, Method, SipReply, SipRequest};

use super::single::{Role, SingleSubscription};

/// All subscriptions of one dialog, plus the pending-transaction maps.
pub struct SubscriptionSet {
    dialog: Arc<dyn SubscriptionDialog>,
    event_queue: Option<Arc<dyn EventQueue>>,
    timers: Arc<dyn TimerService>,
    settings: TimerSettings,

    /// Owned subscriptions in creation order
    subs: Vec<Arc<SingleSubscription>>,
    /// UAC transactions awaiting a reply, by CSeq
    uac_cseq_map: HashMap<u32, Arc<SingleSubscription>>,
    /// UAS transactions awaiting their reply to be sent, by CSeq
    uas_cseq_map: HashMap<u32, Arc<SingleSubscription>>,
}

impl SubscriptionSet {
    /// Create an empty set for the given dialog.
    ///
    /// `event_queue`, when present, is poked after every timer-driven
    /// termination so the owning session re-examines its subscriptions.
    pub fn new(
        dialog: Arc<dyn SubscriptionDialog>,
        event_queue: Option<Arc<dyn EventQueue>>,
        timers: Arc<dyn TimerService>,
        settings: TimerSettings,
    ) -> Self {
        Self {
            dialog,
            event_queue,
            timers,
            settings,
            subs: Vec::new(),
            uac_cseq_map: HashMap::new(),
            uas_cseq_map: HashMap::new(),
        }
    }

    /// Number of subscriptions currently held, terminated ones included
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// Whether the set holds no subscriptions
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Find a subscription by its full identity
    pub fn find(&self, role: Role, event: &str, id: &str) -> Option<Arc<SingleSubscription>> {
        self.subs
            .iter()
            .find(|s| s.role() == role && s.event() == event && s.id() == id)
            .cloned()
    }

    /// Force every subscription into `Terminated`.
    pub fn terminate(&self) {
        for sub in &self.subs {
            sub.terminate();
        }
    }

    /// Dispatch an inbound request (UAS side).
    ///
    /// Returns `false` iff the request was rejected; a response has been
    /// sent through the dialog in that case.
    pub fn on_request_in(&mut self, req: &SipRequest) -> bool {
        let sub = match self.match_subscription(req, false) {
            Some(sub) if !sub.terminated() => sub,
            _ => {
                self.send_reply(req, 481, "Subscription Does Not Exist");
                return false;
            }
        };

        if !sub.on_request_in(req) {
            // Refused (response already sent); no reply to track.
            return false;
        }
        self.uas_cseq_map.insert(req.cseq, sub);
        true
    }

    /// Dispatch an outbound request (UAC side).
    pub fn on_request_sent(&mut self, req: &SipRequest) {
        let Some(sub) = self.match_subscription(req, true) else {
            error!(
                method = %req.method,
                cseq = req.cseq,
                "sent a request for which no subscription could be obtained"
            );
            return;
        };

        sub.on_request_sent(req);
        self.uac_cseq_map.insert(req.cseq, sub);
    }

    /// Dispatch an inbound reply to a request we sent (UAC side).
    ///
    /// Returns `false` when no pending transaction matches the CSeq.
    pub fn on_reply_in(&mut self, req: &SipRequest, reply: &SipReply) -> bool {
        let Some(sub) = self.uac_cseq_map.remove(&req.cseq) else {
            debug!(cseq = req.cseq, "no pending UAC transaction for reply");
            return false;
        };

        sub.reply_fsm(req, reply);
        if sub.terminated() {
            self.reap(&sub);
        }
        true
    }

    /// Dispatch a reply we sent to an inbound request (UAS side).
    ///
    /// Returns `false` when no pending transaction matches the CSeq.
    pub fn on_reply_sent(&mut self, req: &SipRequest, reply: &SipReply) -> bool {
        let Some(sub) = self.uas_cseq_map.remove(&req.cseq) else {
            debug!(cseq = req.cseq, "no pending UAS transaction for reply");
            return false;
        };

        sub.reply_fsm(req, reply);
        if sub.terminated() {
            self.reap(&sub);
        }
        true
    }

    /// Match a request to a subscription, creating one on a first
    /// SUBSCRIBE/REFER with no match.
    fn match_subscription(
        &mut self,
        req: &SipRequest,
        uac: bool,
    ) -> Option<Arc<SingleSubscription>> {
        // REFER always creates: its id derives from the CSeq and is unique
        // per transaction.
        if self.dialog.remote_tag().is_empty() || req.method == Method::Refer || self.subs.is_empty()
        {
            debug!(
                method = %req.method,
                "no remote tag, REFER or empty set: creating subscription"
            );
            return self.create_subscription(req, uac);
        }

        let role = match req.method {
            Method::Subscribe => {
                if uac {
                    Role::Subscriber
                } else {
                    Role::Notifier
                }
            }
            Method::Notify => {
                if uac {
                    Role::Notifier
                } else {
                    Role::Subscriber
                }
            }
            _ => {
                debug!(method = %req.method, "unsupported request");
                return None;
            }
        };

        let ev = req
            .header(headers::EVENT)
            .and_then(|v| v.parse::<Event>().ok())
            .unwrap_or_default();
        let id = ev.id_or_empty();
        // A REFER-package request without an id matches the first refer
        // subscription (RFC 3515 implicit subscription).
        let no_id = id.is_empty() && ev.package == "refer";

        let position = self.subs.iter().position(|s| {
            s.role() == role && s.event() == ev.package && (no_id || s.id() == id)
        });

        if let Some(index) = position {
            if !self.subs[index].terminated() {
                return Some(self.subs[index].clone());
            }
            debug!("matched terminated subscription: reaping it first");
            self.subs.remove(index);
        }

        if req.method == Method::Subscribe {
            debug!("no match found, SUBSCRIBE: creating subscription");
            return self.create_subscription(req, uac);
        }

        None
    }

    /// Build a subscription from the request and take a dialog usage for
    /// it. A method that cannot create one is answered with 501.
    fn create_subscription(
        &mut self,
        req: &SipRequest,
        uac: bool,
    ) -> Option<Arc<SingleSubscription>> {
        let Some(sub) = SingleSubscription::from_request(
            req,
            uac,
            self.dialog.clone(),
            self.event_queue.clone(),
            self.timers.clone(),
            self.settings,
        ) else {
            self.send_reply(req, 501, "NOTIFY cannot create a subscription");
            return None;
        };

        self.dialog.inc_usages();
        self.subs.push(sub.clone());
        Some(sub)
    }

    fn reap(&mut self, sub: &Arc<SingleSubscription>) {
        self.subs.retain(|s| !Arc::ptr_eq(s, sub));
    }

    fn send_reply(&self, req: &SipRequest, code: u16, reason: &str) {
        if let Err(e) = self.dialog.reply(req, code, reason, &[]) {
            error!(code, error = %e, "failed to send response");
        }
    }
}

impl std::fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("subs", &self.subs)
            .field("uac_pending", &self.uac_cseq_map.len())
            .field("uas_pending", &self.uas_cseq_map.len())
            .finish()
    }
}
