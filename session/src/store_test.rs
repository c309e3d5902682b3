use super::*;

fn academic() -> AcademicUser {
    AcademicUser { email: "a@uni.edu".into(), tier: "academic".into(), queries_remaining: 40, daily_limit: 50 }
}

#[test]
fn starts_loading_and_signed_out() {
    let store = AuthStore::new();
    let state = store.snapshot();
    assert!(state.is_loading);
    assert!(!state.is_authenticated);
    assert!(state.error.is_none());
}

#[test]
fn setters_update_snapshot() {
    let store = AuthStore::new();
    store.set_authenticated(true);
    store.set_loading(false);
    store.set_error(Some("nope".into()));
    store.set_academic_user(academic());
    store.update_queries_remaining(39);

    let state = store.snapshot();
    assert!(state.is_authenticated);
    assert!(!state.is_loading);
    assert_eq!(state.error.as_deref(), Some("nope"));
    assert_eq!(state.tier.as_deref(), Some("academic"));
    assert_eq!(state.queries_remaining, Some(39));
    assert_eq!(state.daily_limit, Some(50));
}

#[test]
fn reset_clears_everything_and_stops_loading() {
    let store = AuthStore::new();
    store.set_authenticated(true);
    store.set_academic_user(academic());
    store.reset();
    assert_eq!(store.snapshot(), AuthState::signed_out());
}

#[tokio::test]
async fn subscribers_observe_changes() {
    let store = AuthStore::new();
    let mut rx = store.subscribe();
    store.set_authenticated(true);
    rx.changed().await.expect("store should still be alive");
    assert!(rx.borrow_and_update().is_authenticated);
}

#[test]
fn clones_share_state() {
    let store = AuthStore::new();
    let other = store.clone();
    other.set_authenticated(true);
    assert!(store.snapshot().is_authenticated);
}
