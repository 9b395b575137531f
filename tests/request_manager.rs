//! Tests for response correlation.

use std::time::Duration;

use rstest::{fixture, rstest};
use streamwire::{ReceiveResponse, payload::RequestManager};
use tokio::time::timeout;
use uuid::Uuid;

#[fixture]
fn manager() -> RequestManager { RequestManager::new() }

fn response(status_code: u16) -> ReceiveResponse {
    ReceiveResponse {
        status_code,
        streams: Vec::new(),
    }
}

#[rstest]
#[tokio::test]
async fn signalled_response_is_delivered(manager: RequestManager) {
    let id = Uuid::new_v4();
    let pending = manager.get_response(id);
    assert_eq!(manager.pending_len(), 1);
    assert!(manager.signal_response(id, Some(response(200))));
    let got = pending.await.expect("response delivered");
    assert_eq!(got.status_code, 200);
    assert_eq!(manager.pending_len(), 0);
}

#[rstest]
#[tokio::test]
async fn signal_before_await_is_not_lost(manager: RequestManager) {
    let id = Uuid::new_v4();
    let pending = manager.get_response(id);
    manager.signal_response(id, Some(response(202)));
    let got = timeout(Duration::from_secs(1), pending)
        .await
        .expect("already resolved");
    assert_eq!(got.map(|r| r.status_code), Some(202));
}

#[rstest]
fn unknown_id_is_rejected(manager: RequestManager) {
    assert!(!manager.signal_response(Uuid::new_v4(), Some(response(200))));
}

#[rstest]
#[tokio::test]
async fn duplicate_registration_resolves_to_none(manager: RequestManager) {
    let id = Uuid::new_v4();
    let first = manager.get_response(id);
    let second = manager.get_response(id);
    assert!(second.await.is_none());
    assert_eq!(manager.pending_len(), 1);

    assert!(manager.signal_response(id, Some(response(204))));
    assert_eq!(first.await.map(|r| r.status_code), Some(204));
}

#[rstest]
#[tokio::test]
async fn second_signal_returns_false(manager: RequestManager) {
    let id = Uuid::new_v4();
    let pending = manager.get_response(id);
    assert!(manager.signal_response(id, None));
    assert!(!manager.signal_response(id, Some(response(200))));
    assert!(pending.await.is_none());
}

#[rstest]
fn signal_after_waiter_dropped_still_succeeds(manager: RequestManager) {
    let id = Uuid::new_v4();
    drop(manager.get_response(id));
    assert!(manager.signal_response(id, Some(response(200))));
}

#[rstest]
#[tokio::test]
async fn cancel_all_resolves_every_waiter(manager: RequestManager) {
    let a = manager.get_response(Uuid::new_v4());
    let b = manager.get_response(Uuid::new_v4());
    manager.cancel_all();
    assert_eq!(manager.pending_len(), 0);
    assert!(a.await.is_none());
    assert!(b.await.is_none());
}
