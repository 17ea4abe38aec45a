//! Subscription lifecycle timers
//!
//! Two timers guard every subscription: Timer N (RFC 6665 §4.1.2) bounds
//! the wait for the first NOTIFY after a SUBSCRIBE or REFER, and the
//! expiry timer tracks the negotiated subscription lifetime. Both are armed
//! against an application-wide timer service, injected as a trait so tests
//! can drive a virtual clock.
//!
//! Arming a timer replaces any prior arming for the same [`TimerId`];
//! removal is idempotent. Callbacks are delivered on a service-owned task
//! or thread, never on the caller's.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Serialize, Deserialize};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

/// Default T1 retransmission interval (RFC 3261), in milliseconds
pub const DEFAULT_T1_MS: u64 = 500;

/// Opaque identity of one timer instance.
///
/// Plays the role of the timer's stable address: the service keys replace
/// and remove operations on it. Allocated once per timer and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Allocate a fresh, process-unique timer id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TimerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Which lifecycle timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// RFC 6665 Timer N: bounds the wait for the first NOTIFY
    TimerN,
    /// Subscription expiry, from Expires or Subscription-State
    Expires,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::TimerN => write!(f, "timer_n"),
            TimerKind::Expires => write!(f, "subscription_expire"),
        }
    }
}

/// Receives the expiry callback for an armed timer.
pub trait TimerHandler: Send + Sync {
    /// Invoked on a service-owned task/thread when the timer expires
    fn fire(&self);
}

/// The application timer service consumed by the subscription core.
pub trait TimerService: Send + Sync {
    /// Arm (or re-arm) the timer identified by `id` to fire `handler` after
    /// `seconds`. Replaces any prior arming for the same id.
    fn set_timer(&self, id: TimerId, seconds: f64, handler: Arc<dyn TimerHandler>);

    /// Cancel the timer identified by `id`. Idempotent; a timer that
    /// already fired or was never armed is not an error.
    fn remove_timer(&self, id: TimerId);
}

/// Timer durations the core derives from the base retransmission interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// T1, the base SIP retransmission interval
    pub t1: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            t1: Duration::from_millis(DEFAULT_T1_MS),
        }
    }
}

impl TimerSettings {
    /// Timer N duration, 64·T1 (RFC 6665 §4.1.2)
    pub fn timer_n_duration(&self) -> Duration {
        self.t1 * 64
    }
}

/// Tokio-backed [`TimerService`]: one sleeping task per armed timer.
///
/// Must be created and used inside a tokio runtime. `remove_timer` aborts
/// the sleeping task; a callback that has already started running is not
/// joined, so handlers must tolerate a late fire (the subscription core's
/// handlers do, via their weak back-reference and idempotent termination).
#[derive(Debug, Default)]
pub struct TokioTimerService {
    tasks: DashMap<TimerId, JoinHandle<()>>,
}

impl TokioTimerService {
    /// Create an empty timer service
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently tracked timer tasks
    pub fn armed(&self) -> usize {
        self.tasks.len()
    }
}

impl TimerService for TokioTimerService {
    fn set_timer(&self, id: TimerId, seconds: f64, handler: Arc<dyn TimerHandler>) {
        trace!(%id, seconds, "arming timer");
        let task = tokio::spawn(async move {
            sleep(Duration::from_secs_f64(seconds)).await;
            handler.fire();
        });
        if let Some(previous) = self.tasks.insert(id, task) {
            previous.abort();
        }
    }

    fn remove_timer(&self, id: TimerId) {
        if let Some((_, task)) = self.tasks.remove(&id) {
            trace!(%id, "removing timer");
            task.abort();
        }
    }
}

impl Drop for TokioTimerService {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
    }
}
