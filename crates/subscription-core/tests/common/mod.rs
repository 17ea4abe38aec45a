//! Shared fixtures for the integration suites: a recording mock dialog, a
//! virtual-clock timer service, and request/reply builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use sipevent_subscription_core::errors::Result;
use sipevent_subscription_core::timer::{TimerHandler, TimerId, TimerService, TimerSettings};
use sipevent_subscription_core::{
    Header, Method, SipReply, SipRequest, SubscriptionDialog, SubscriptionSet,
};

/// A reply the core sent through the dialog
#[derive(Debug, Clone)]
pub struct RecordedReply {
    pub code: u16,
    pub reason: String,
    pub headers: Vec<Header>,
}

impl RecordedReply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Recording stand-in for the enclosing dialog.
pub struct MockDialog {
    local_tag: String,
    remote_tag: Mutex<String>,
    route_set: Mutex<String>,
    incs: AtomicU32,
    decs: AtomicU32,
    replies: Mutex<Vec<RecordedReply>>,
}

impl MockDialog {
    /// Dialog with no remote tag yet (UAC before the first 2xx)
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            local_tag: "local-tag-1".to_string(),
            remote_tag: Mutex::new(String::new()),
            route_set: Mutex::new(String::new()),
            incs: AtomicU32::new(0),
            decs: AtomicU32::new(0),
            replies: Mutex::new(Vec::new()),
        })
    }

    /// Established dialog (both tags known)
    pub fn established() -> Arc<Self> {
        let dialog = Self::new();
        *dialog.remote_tag.lock().unwrap() = "remote-tag-1".to_string();
        dialog
    }

    pub fn usages(&self) -> i64 {
        i64::from(self.incs.load(Ordering::SeqCst)) - i64::from(self.decs.load(Ordering::SeqCst))
    }

    pub fn inc_count(&self) -> u32 {
        self.incs.load(Ordering::SeqCst)
    }

    pub fn dec_count(&self) -> u32 {
        self.decs.load(Ordering::SeqCst)
    }

    pub fn route_set(&self) -> String {
        self.route_set.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<RecordedReply> {
        self.replies.lock().unwrap().clone()
    }

    pub fn last_reply(&self) -> Option<RecordedReply> {
        self.replies.lock().unwrap().last().cloned()
    }
}

impl SubscriptionDialog for MockDialog {
    fn local_tag(&self) -> String {
        self.local_tag.clone()
    }

    fn remote_tag(&self) -> String {
        self.remote_tag.lock().unwrap().clone()
    }

    fn update_remote_tag(&self, tag: &str) {
        *self.remote_tag.lock().unwrap() = tag.to_string();
    }

    fn update_route_set(&self, route: &str) {
        *self.route_set.lock().unwrap() = route.to_string();
    }

    fn inc_usages(&self) {
        self.incs.fetch_add(1, Ordering::SeqCst);
    }

    fn dec_usages(&self) {
        self.decs.fetch_add(1, Ordering::SeqCst);
    }

    fn reply(
        &self,
        _req: &SipRequest,
        code: u16,
        reason: &str,
        extra_headers: &[Header],
    ) -> Result<()> {
        self.replies.lock().unwrap().push(RecordedReply {
            code,
            reason: reason.to_string(),
            headers: extra_headers.to_vec(),
        });
        Ok(())
    }
}

struct ArmedTimer {
    seconds: f64,
    handler: Arc<dyn TimerHandler>,
}

/// Virtual-clock timer service: records armings, fires on demand.
#[derive(Default)]
pub struct ManualTimerService {
    armed: Mutex<HashMap<TimerId, ArmedTimer>>,
    removals: AtomicU32,
}

impl ManualTimerService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn armed_count(&self) -> usize {
        self.armed.lock().unwrap().len()
    }

    /// Durations of all armed timers, ascending
    pub fn armed_seconds(&self) -> Vec<f64> {
        let mut seconds: Vec<f64> = self
            .armed
            .lock()
            .unwrap()
            .values()
            .map(|t| t.seconds)
            .collect();
        seconds.sort_by(f64::total_cmp);
        seconds
    }

    pub fn has_armed(&self, seconds: f64) -> bool {
        self.armed_seconds().contains(&seconds)
    }

    pub fn removals(&self) -> u32 {
        self.removals.load(Ordering::SeqCst)
    }

    /// Expire the first armed timer with the given duration. The handler
    /// runs on the caller's thread, standing in for the service thread.
    pub fn fire(&self, seconds: f64) -> bool {
        let handler = {
            let mut armed = self.armed.lock().unwrap();
            let Some(id) = armed
                .iter()
                .find(|(_, t)| t.seconds == seconds)
                .map(|(id, _)| *id)
            else {
                return false;
            };
            armed.remove(&id).map(|t| t.handler)
        };
        match handler {
            Some(handler) => {
                handler.fire();
                true
            }
            None => false,
        }
    }
}

impl TimerService for ManualTimerService {
    fn set_timer(&self, id: TimerId, seconds: f64, handler: Arc<dyn TimerHandler>) {
        self.armed
            .lock()
            .unwrap()
            .insert(id, ArmedTimer { seconds, handler });
    }

    fn remove_timer(&self, id: TimerId) {
        if self.armed.lock().unwrap().remove(&id).is_some() {
            self.removals.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Everything a scenario needs: the set plus handles on its collaborators.
pub struct Fixture {
    pub set: SubscriptionSet,
    pub dialog: Arc<MockDialog>,
    pub timers: Arc<ManualTimerService>,
    pub wake_rx: mpsc::UnboundedReceiver<()>,
}

fn build(dialog: Arc<MockDialog>) -> Fixture {
    let timers = ManualTimerService::new();
    let (wake_tx, wake_rx) = mpsc::unbounded_channel::<()>();
    let set = SubscriptionSet::new(
        dialog.clone(),
        Some(Arc::new(wake_tx)),
        timers.clone(),
        TimerSettings::default(),
    );
    Fixture {
        set,
        dialog,
        timers,
        wake_rx,
    }
}

/// Fixture whose dialog has no remote tag yet
pub fn fixture() -> Fixture {
    build(MockDialog::new())
}

/// Fixture whose dialog is already established
pub fn established_fixture() -> Fixture {
    build(MockDialog::established())
}

/// Timer N duration under default settings, in seconds
pub const TIMER_N_SECS: f64 = 32.0;

pub fn subscribe(cseq: u32, event: &str) -> SipRequest {
    SipRequest::new(Method::Subscribe, cseq).with_header("Event", event)
}

pub fn notify(cseq: u32, event: &str, subscription_state: &str) -> SipRequest {
    SipRequest::new(Method::Notify, cseq)
        .with_header("Event", event)
        .with_header("Subscription-State", subscription_state)
}

pub fn refer(cseq: u32) -> SipRequest {
    SipRequest::new(Method::Refer, cseq).with_header("Refer-To", "sip:charlie@example.com")
}

/// A final reply for `req`'s transaction, with no extra headers
pub fn final_reply(req: &SipRequest, code: u16, reason: &str) -> SipReply {
    SipReply::new(code, reason, req.cseq, req.method.clone()).with_to_tag("remote-tag-1")
}

/// A 2xx for `req` carrying an Expires header and a route set
pub fn ok_with_expires(req: &SipRequest, expires: u32) -> SipReply {
    final_reply(req, 200, "OK")
        .with_route("<sip:proxy.example.com;lr>")
        .with_header("Expires", expires.to_string())
}
