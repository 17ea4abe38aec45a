//! REFER implicit-subscription tests (RFC 3515)
//!
//! Every REFER creates its own subscription with `event = "refer"` and the
//! REFER's CSeq as the event id; progress NOTIFYs for the transfer are
//! matched back through that identity.

mod common;

use common::*;
use sipevent_subscription_core::{Role, SubState, SubscriptionDialog};

#[test]
fn refer_creates_a_fresh_subscription_per_cseq() {
    let mut f = fixture();

    f.set.on_request_sent(&refer(7));
    let first = f
        .set
        .find(Role::Subscriber, "refer", "7")
        .expect("refer subscription created");
    assert_eq!(first.state(), SubState::NotifyWait);
    assert_eq!(first.pending_subscribe(), 1);

    // A second REFER never matches the first; its id is its own CSeq.
    f.set.on_request_sent(&refer(8));
    let second = f
        .set
        .find(Role::Subscriber, "refer", "8")
        .expect("second refer subscription created");
    assert_eq!(second.state(), SubState::NotifyWait);

    assert_eq!(f.set.len(), 2);
    assert_eq!(f.dialog.usages(), 2);
}

#[test]
fn refer_2xx_without_expires_keeps_the_subscription() {
    let mut f = fixture();

    let refer_req = refer(7);
    f.set.on_request_sent(&refer_req);
    let sub = f.set.find(Role::Subscriber, "refer", "7").unwrap();

    // 202 Accepted carries no Expires; unlike SUBSCRIBE that is fine,
    // Timer N keeps the wait for the first NOTIFY bounded.
    assert!(f.set.on_reply_in(&refer_req, &final_reply(&refer_req, 202, "Accepted")));

    assert_eq!(sub.state(), SubState::NotifyWait);
    assert_eq!(sub.pending_subscribe(), 0);
    assert_eq!(f.dialog.remote_tag(), "remote-tag-1");
    assert!(f.timers.has_armed(TIMER_N_SECS));
}

#[test]
fn transfer_progress_notify_matches_by_refer_id() {
    let mut f = fixture();

    let refer_req = refer(7);
    f.set.on_request_sent(&refer_req);
    f.set.on_reply_in(&refer_req, &final_reply(&refer_req, 202, "Accepted"));

    let progress = notify(3, "refer;id=7", "active;expires=60");
    assert!(f.set.on_request_in(&progress));
    assert!(f.set.on_reply_sent(&progress, &final_reply(&progress, 200, "OK")));

    let sub = f.set.find(Role::Subscriber, "refer", "7").unwrap();
    assert_eq!(sub.state(), SubState::Active);
    assert!(!f.timers.has_armed(TIMER_N_SECS));
    assert!(f.timers.has_armed(60.0));
}

#[test]
fn notify_without_id_matches_the_first_refer_subscription() {
    let mut f = fixture();

    f.set.on_request_sent(&refer(7));
    let refer_req = refer(8);
    f.set.on_request_sent(&refer_req);
    f.set.on_reply_in(&refer_req, &final_reply(&refer_req, 202, "Accepted"));

    // RFC 3515 notifiers may omit the id; the first refer subscription in
    // creation order wins.
    let progress = notify(3, "refer", "active;expires=60");
    assert!(f.set.on_request_in(&progress));
    assert!(f.set.on_reply_sent(&progress, &final_reply(&progress, 200, "OK")));

    let first = f.set.find(Role::Subscriber, "refer", "7").unwrap();
    let second = f.set.find(Role::Subscriber, "refer", "8").unwrap();
    assert_eq!(first.state(), SubState::Active);
    assert_eq!(second.state(), SubState::NotifyWait);
}

#[test]
fn final_transfer_notify_terminates_the_refer_subscription() {
    let mut f = fixture();

    let refer_req = refer(7);
    f.set.on_request_sent(&refer_req);
    f.set.on_reply_in(&refer_req, &final_reply(&refer_req, 202, "Accepted"));

    let done = notify(3, "refer;id=7", "terminated;reason=noresource");
    assert!(f.set.on_request_in(&done));
    assert!(f.set.on_reply_sent(&done, &final_reply(&done, 200, "OK")));

    assert!(f.set.is_empty());
    assert_eq!(f.dialog.usages(), 0);
}

#[test]
fn declined_refer_terminates_in_notify_wait() {
    let mut f = fixture();

    let refer_req = refer(7);
    f.set.on_request_sent(&refer_req);

    assert!(f.set.on_reply_in(&refer_req, &final_reply(&refer_req, 603, "Decline")));

    assert!(f.set.is_empty());
    assert_eq!(f.dialog.usages(), 0);
}

#[test]
fn inbound_refer_is_admitted_and_tracked() {
    let mut f = established_fixture();

    // UAS side: the peer transfers us.
    let refer_req = refer(42);
    assert!(f.set.on_request_in(&refer_req));

    let sub = f.set.find(Role::Notifier, "refer", "42").unwrap();
    assert_eq!(sub.state(), SubState::NotifyWait);
    assert_eq!(sub.pending_subscribe(), 1);

    assert!(f.set.on_reply_sent(&refer_req, &final_reply(&refer_req, 202, "Accepted")));
    assert_eq!(sub.pending_subscribe(), 0);
    assert_eq!(sub.state(), SubState::NotifyWait);
}

#[test]
fn unsolicited_notify_on_fresh_dialog_cannot_create() {
    let mut f = fixture();

    // No remote tag and no subscriptions: the matcher goes straight to
    // creation, which a NOTIFY cannot perform.
    let stray = notify(1, "refer", "active;expires=60");
    assert!(!f.set.on_request_in(&stray));

    let replies = f.dialog.replies();
    assert!(replies.iter().any(|r| r.code == 501));
    assert!(f.set.is_empty());
    assert_eq!(f.dialog.inc_count(), 0);
}
