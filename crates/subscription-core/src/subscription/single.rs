//! A single SIP subscription and its state machine
//!
//! One [`SingleSubscription`] is one event-package subscription inside a
//! dialog, identified by `(role, event, id)`. Inputs arrive from five
//! sources: inbound requests, sent requests, inbound replies, sent replies,
//! and timer expiries. All of them funnel through the state mutex; every
//! transition into [`SubState::Terminated`] releases the subscription's
//! usage on the enclosing dialog exactly once.
//!
//! ```text
//! Init → NotifyWait → {Pending, Active} → Terminated
//! ```
//!
//! Timer N (RFC 6665 §4.1.2) is armed for every SUBSCRIBE/REFER and
//! cancelled once an authoritative NOTIFY is processed; the expiry timer
//! follows the negotiated subscription lifetime.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::{debug, error, warn};

use crate::dialog::SubscriptionDialog;
use crate::events::EventQueue;
use crate::timer::{TimerHandler, TimerId, TimerKind, TimerService, TimerSettings};
use crate::types::headers::{self, Header};
use crate::types::{Event, Method, SipReply, SipRequest, StateToken, SubscriptionStateHeader};

/// Response codes that terminate a dialog usage when received on a
/// subscription refresh or a NOTIFY (RFC 5057 §5.2).
const USAGE_TERMINATING_CODES: [u16; 4] = [405, 481, 489, 501];

fn terminates_usage(code: u16) -> bool {
    USAGE_TERMINATING_CODES.contains(&code)
}

/// Which side of the subscription this peer plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Issues SUBSCRIBE/REFER, receives NOTIFY
    Subscriber,
    /// Receives SUBSCRIBE/REFER, sends NOTIFY
    Notifier,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Subscriber => write!(f, "Subscriber"),
            Role::Notifier => write!(f, "Notifier"),
        }
    }
}

/// Subscription lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubState {
    /// Created, no SUBSCRIBE/REFER processed yet
    Init,
    /// Waiting for the first NOTIFY under Timer N
    NotifyWait,
    /// Installed but awaiting authorization
    Pending,
    /// Installed and delivering notifications
    Active,
    /// Ended; absorbing
    Terminated,
}

impl fmt::Display for SubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubState::Init => write!(f, "init"),
            SubState::NotifyWait => write!(f, "notify_wait"),
            SubState::Pending => write!(f, "pending"),
            SubState::Active => write!(f, "active"),
            SubState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Timer callback target; holds a weak back-reference so a fire racing
/// subscription destruction is a no-op.
struct SubscriptionTimer {
    id: TimerId,
    kind: TimerKind,
    sub: Weak<SingleSubscription>,
}

impl TimerHandler for SubscriptionTimer {
    fn fire(&self) {
        if let Some(sub) = self.sub.upgrade() {
            sub.on_timer(self.kind);
        }
    }
}

/// One event-package subscription inside a dialog.
///
/// Shared as `Arc` between the owning [`SubscriptionSet`], the pending-CSeq
/// maps, and the timer service's callbacks.
///
/// [`SubscriptionSet`]: crate::subscription::SubscriptionSet
pub struct SingleSubscription {
    role: Role,
    event: String,
    id: String,

    state: Mutex<SubState>,
    /// In-flight SUBSCRIBE/REFER transactions on this subscription
    pending_subscribe: AtomicU32,

    timer_n: Arc<SubscriptionTimer>,
    timer_expires: Arc<SubscriptionTimer>,

    dialog: Arc<dyn SubscriptionDialog>,
    event_queue: Option<Arc<dyn EventQueue>>,
    timers: Arc<dyn TimerService>,
    settings: TimerSettings,
}

impl SingleSubscription {
    pub(crate) fn new(
        role: Role,
        event: String,
        id: String,
        dialog: Arc<dyn SubscriptionDialog>,
        event_queue: Option<Arc<dyn EventQueue>>,
        timers: Arc<dyn TimerService>,
        settings: TimerSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<SingleSubscription>| Self {
            role,
            event,
            id,
            state: Mutex::new(SubState::Init),
            pending_subscribe: AtomicU32::new(0),
            timer_n: Arc::new(SubscriptionTimer {
                id: TimerId::next(),
                kind: TimerKind::TimerN,
                sub: weak.clone(),
            }),
            timer_expires: Arc::new(SubscriptionTimer {
                id: TimerId::next(),
                kind: TimerKind::Expires,
                sub: weak.clone(),
            }),
            dialog,
            event_queue,
            timers,
            settings,
        })
    }

    /// Derive `(role, event, id)` from the creating request and build the
    /// subscription. Only SUBSCRIBE and REFER can create one; unsolicited
    /// NOTIFYs are not supported.
    pub(crate) fn from_request(
        req: &SipRequest,
        uac: bool,
        dialog: Arc<dyn SubscriptionDialog>,
        event_queue: Option<Arc<dyn EventQueue>>,
        timers: Arc<dyn TimerService>,
        settings: TimerSettings,
    ) -> Option<Arc<Self>> {
        let role = if uac { Role::Subscriber } else { Role::Notifier };

        let (event, id) = match req.method {
            Method::Subscribe => {
                let ev = req
                    .header(headers::EVENT)
                    .and_then(|v| v.parse::<Event>().ok())
                    .unwrap_or_default();
                (ev.package.clone(), ev.id_or_empty().to_string())
            }
            // TODO: honour Refer-Sub (RFC 4488) before creating an implicit
            // subscription for a REFER.
            Method::Refer => ("refer".to_string(), req.cseq.to_string()),
            _ => {
                debug!(method = %req.method, "subscriptions are only created by SUBSCRIBE or REFER");
                return None;
            }
        };

        Some(Self::new(
            role, event, id, dialog, event_queue, timers, settings,
        ))
    }

    /// This peer's role in the subscription
    pub fn role(&self) -> Role {
        self.role
    }

    /// Event package name
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Event id; for REFER, the decimal CSeq of the originating REFER
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state
    pub fn state(&self) -> SubState {
        *self.lock_state()
    }

    /// Whether the subscription has reached its absorbing state
    pub fn terminated(&self) -> bool {
        self.state() == SubState::Terminated
    }

    /// In-flight SUBSCRIBE/REFER transaction count
    pub fn pending_subscribe(&self) -> u32 {
        self.pending_subscribe.load(Ordering::SeqCst)
    }

    /// Force the subscription into `Terminated`. Idempotent; the dialog
    /// usage is released on the first call only.
    pub fn terminate(&self) {
        let mut state = self.lock_state();
        self.set_state(&mut state, SubState::Terminated);
    }

    /// Accept an inbound request targeting this subscription (UAS side).
    ///
    /// Returns `false` iff the request was refused locally; a response has
    /// already been sent through the dialog in that case. On `true` the
    /// caller records the CSeq for reply dispatch.
    pub fn on_request_in(&self, req: &SipRequest) -> bool {
        if req.method.creates_subscription() {
            // Refresh semantics forbid overlapping SUBSCRIBE/REFER
            // transactions on one usage (RFC 6665 §4.2.1).
            if self.pending_subscribe() > 0 {
                let retry_after = rand::thread_rng().gen_range(0..10u32);
                debug!(
                    event = %self.event,
                    id = %self.id,
                    retry_after,
                    "overlapping subscribe refused"
                );
                if let Err(e) = self.dialog.reply(
                    req,
                    500,
                    "Server Internal Error",
                    &[Header::new(headers::RETRY_AFTER, retry_after.to_string())],
                ) {
                    error!(error = %e, "failed to send 500 for overlapping subscribe");
                }
                return false;
            }
            self.pending_subscribe.fetch_add(1, Ordering::SeqCst);
        }

        self.request_fsm(req);
        true
    }

    /// Note an outbound request handed to the transport (UAC side).
    pub fn on_request_sent(&self, req: &SipRequest) {
        if req.method.creates_subscription() {
            self.pending_subscribe.fetch_add(1, Ordering::SeqCst);
        }
        self.request_fsm(req);
    }

    /// SUBSCRIBE/REFER request processing, either direction.
    fn request_fsm(&self, req: &SipRequest) {
        if !req.method.creates_subscription() {
            return;
        }

        {
            let mut state = self.lock_state();
            if *state == SubState::Init {
                self.set_state(&mut state, SubState::NotifyWait);
            }
        }

        // Start Timer N (RFC 6665 §4.1.2), bounding the wait for the first
        // NOTIFY of this transaction. Armed outside the state lock.
        let duration = self.settings.timer_n_duration();
        debug!(
            local_tag = %self.dialog.local_tag(),
            kind = %TimerKind::TimerN,
            seconds = duration.as_secs_f64(),
            "arming timer"
        );
        self.timers
            .set_timer(self.timer_n.id, duration.as_secs_f64(), self.timer_n.clone());
    }

    /// Consume a final reply belonging to a prior request on this
    /// subscription. Provisional replies are ignored.
    pub fn reply_fsm(&self, req: &SipRequest, reply: &SipReply) {
        if !reply.is_final() {
            return;
        }

        if req.method.creates_subscription() {
            self.subscribe_reply(req, reply);
            self.pending_subscribe
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    Some(n.saturating_sub(1))
                })
                .ok();
        } else if req.method == Method::Notify {
            self.notify_reply(req, reply);
        }
    }

    /// Final reply to a SUBSCRIBE or REFER.
    fn subscribe_reply(&self, req: &SipRequest, reply: &SipReply) {
        if reply.code >= 300 {
            let mut state = self.lock_state();
            if *state == SubState::NotifyWait {
                // Initial subscription establishment failed.
                self.set_state(&mut state, SubState::Terminated);
            } else if terminates_usage(reply.code) {
                // Refresh failed with a usage-terminating code (RFC 5057);
                // any other failure only fails the transaction.
                self.set_state(&mut state, SubState::Terminated);
            }
            return;
        }

        // Success: adopt the dialog identity if this reply establishes it.
        if self.dialog.remote_tag().is_empty() {
            self.dialog.update_remote_tag(&reply.to_tag);
            self.dialog.update_route_set(&reply.route);
        }

        match reply.header(headers::EXPIRES).and_then(headers::parse_expires) {
            Some(expires) if expires > 0 => {
                debug!(
                    local_tag = %self.dialog.local_tag(),
                    kind = %TimerKind::Expires,
                    expires,
                    "arming timer"
                );
                self.timers.set_timer(
                    self.timer_expires.id,
                    f64::from(expires),
                    self.timer_expires.clone(),
                );
            }
            Some(_) => {
                // Expires: 0. Timer N is armed for each SUBSCRIBE request,
                // so the usage still has a bounded lifetime.
                debug!("Expires header equals 0");
            }
            None => {
                if req.method == Method::Subscribe {
                    // Replies to SUBSCRIBE MUST carry Expires (RFC 6665
                    // §4.2.1); without one the usage has no lifetime.
                    warn!(
                        event = %self.event,
                        id = %self.id,
                        "2xx to SUBSCRIBE without a usable Expires header"
                    );
                    let mut state = self.lock_state();
                    self.set_state(&mut state, SubState::Terminated);
                }
            }
        }
    }

    /// Final reply to a NOTIFY; the authoritative subscription state is on
    /// the NOTIFY request itself.
    fn notify_reply(&self, req: &SipRequest, reply: &SipReply) {
        if reply.code >= 300 {
            if terminates_usage(reply.code) {
                let mut state = self.lock_state();
                self.set_state(&mut state, SubState::Terminated);
            }
            return;
        }

        let sub_state = req
            .header(headers::SUBSCRIPTION_STATE)
            .and_then(|v| v.parse::<SubscriptionStateHeader>().ok());

        let next = match &sub_state {
            Some(ss) if ss.expires_or_zero() > 0 && ss.state == StateToken::Active => {
                SubState::Active
            }
            Some(ss) if ss.expires_or_zero() > 0 && ss.state == StateToken::Pending => {
                SubState::Pending
            }
            other => {
                if let Some(ss) = other {
                    if let StateToken::Extension(token) = &ss.state {
                        warn!(token = %token, "extension Subscription-State terminates the usage");
                    }
                    if let Some(reason) = &ss.reason {
                        debug!(reason = %reason, "subscription terminated by notifier");
                    }
                }
                let mut state = self.lock_state();
                self.set_state(&mut state, SubState::Terminated);
                return;
            }
        };

        {
            let mut state = self.lock_state();
            self.set_state(&mut state, next);
        }

        // An authoritative NOTIFY has been processed: Timer N is done and
        // the expiry timer follows the notifier's view.
        let notify_expire = sub_state
            .as_ref()
            .map(SubscriptionStateHeader::expires_or_zero)
            .unwrap_or(0);
        debug!(
            local_tag = %self.dialog.local_tag(),
            kind = %TimerKind::TimerN,
            "removing timer"
        );
        self.timers.remove_timer(self.timer_n.id);
        debug!(
            local_tag = %self.dialog.local_tag(),
            kind = %TimerKind::Expires,
            expires = notify_expire,
            "arming timer"
        );
        self.timers.set_timer(
            self.timer_expires.id,
            f64::from(notify_expire),
            self.timer_expires.clone(),
        );
    }

    /// Timer expiry, delivered on the timer service's thread.
    fn on_timer(&self, kind: TimerKind) {
        debug!(
            local_tag = %self.dialog.local_tag(),
            role = %self.role,
            event = %self.event,
            id = %self.id,
            kind = %kind,
            "subscription timer fired"
        );
        self.terminate();
        // Wake the owning session outside any lock.
        if let Some(queue) = &self.event_queue {
            queue.post_wake();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SubState> {
        // Termination must proceed even if a panic poisoned the lock.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The single funnel for state transitions. `Terminated` is absorbing,
    /// and the transition into it releases the dialog usage exactly once.
    fn set_state(&self, state: &mut SubState, next: SubState) {
        if *state == SubState::Terminated {
            return;
        }
        debug!(event = %self.event, id = %self.id, state = %next, "subscription state");
        *state = next;
        if next == SubState::Terminated {
            self.dialog.dec_usages();
        }
    }
}

impl Drop for SingleSubscription {
    fn drop(&mut self) {
        self.timers.remove_timer(self.timer_n.id);
        self.timers.remove_timer(self.timer_expires.id);
    }
}

impl fmt::Debug for SingleSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleSubscription")
            .field("role", &self.role)
            .field("event", &self.event)
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pending_subscribe", &self.pending_subscribe())
            .finish()
    }
}
