use super::*;
use tokio::time::{Duration, timeout};

fn leader(gate: &RefreshGate) -> RefreshLeader {
    match gate.enter() {
        Ticket::Leader(leader) => leader,
        Ticket::Follower(_) => panic!("expected to lead the refresh"),
    }
}

fn follower(gate: &RefreshGate) -> Waiter {
    match gate.enter() {
        Ticket::Follower(waiter) => waiter,
        Ticket::Leader(_) => panic!("expected to queue behind the refresh"),
    }
}

#[test]
fn first_entry_leads_and_later_entries_queue() {
    let gate = RefreshGate::new();
    assert_eq!(gate.state(), RefreshState::Idle);

    let lead = leader(&gate);
    assert_eq!(gate.state(), RefreshState::Refreshing);

    let _a = follower(&gate);
    let _b = follower(&gate);
    assert_eq!(gate.pending_len(), 2);

    assert_eq!(lead.settle(RefreshOutcome::Refreshed), 2);
    assert_eq!(gate.state(), RefreshState::Idle);
    assert_eq!(gate.pending_len(), 0);
}

#[tokio::test]
async fn every_waiter_receives_the_same_success() {
    let gate = RefreshGate::new();
    let lead = leader(&gate);
    let waiters: Vec<Waiter> = (0..5).map(|_| follower(&gate)).collect();

    lead.settle(RefreshOutcome::Refreshed);

    for waiter in waiters {
        assert_eq!(waiter.wait().await, RefreshOutcome::Refreshed);
    }
}

#[tokio::test]
async fn every_waiter_receives_the_same_failure() {
    let gate = RefreshGate::new();
    let lead = leader(&gate);
    let a = follower(&gate);
    let b = follower(&gate);

    lead.settle(RefreshOutcome::Failed("expired".into()));

    assert_eq!(a.wait().await, RefreshOutcome::Failed("expired".into()));
    assert_eq!(b.wait().await, RefreshOutcome::Failed("expired".into()));
}

#[tokio::test]
async fn dropped_leader_fails_waiters_instead_of_hanging() {
    let gate = RefreshGate::new();
    let lead = leader(&gate);
    let waiter = follower(&gate);

    drop(lead);

    let outcome = timeout(Duration::from_millis(200), waiter.wait())
        .await
        .expect("waiter should be released");
    assert!(!outcome.is_refreshed());
    assert_eq!(gate.state(), RefreshState::Idle);
}

#[tokio::test]
async fn panicking_leader_task_fails_waiters() {
    let gate = RefreshGate::new();
    let lead = leader(&gate);
    let waiter = follower(&gate);

    let task = tokio::spawn(async move {
        let _lead = lead;
        panic!("refresh blew up");
    });
    assert!(task.await.is_err());

    let outcome = timeout(Duration::from_millis(200), waiter.wait())
        .await
        .expect("waiter should be released");
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
}

#[tokio::test]
async fn gate_can_lead_again_after_settling() {
    let gate = RefreshGate::new();
    leader(&gate).settle(RefreshOutcome::Failed("first".into()));

    let second = leader(&gate);
    let waiter = follower(&gate);
    second.settle(RefreshOutcome::Refreshed);
    assert_eq!(waiter.wait().await, RefreshOutcome::Refreshed);
}

#[test]
fn settling_tolerates_departed_waiters() {
    let gate = RefreshGate::new();
    let lead = leader(&gate);
    drop(follower(&gate));
    assert_eq!(lead.settle(RefreshOutcome::Refreshed), 1);
}

#[tokio::test]
async fn leader_can_wait_on_its_own_outcome() {
    let gate = RefreshGate::new();
    let lead = leader(&gate);
    let own = lead.waiter();
    let other = follower(&gate);
    assert_eq!(gate.pending_len(), 2);

    tokio::spawn(async move { lead.settle(RefreshOutcome::Refreshed) });

    assert_eq!(own.wait().await, RefreshOutcome::Refreshed);
    assert_eq!(other.wait().await, RefreshOutcome::Refreshed);
}
