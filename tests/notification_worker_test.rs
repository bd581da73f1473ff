mod common;

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use campus_assessment::{
    database::store::{OutboxStore, SharedStore},
    models::notification::{DeliveryStatus, NotificationIntent, NotificationKind},
    services::notification_service::{
        NotificationWorker, Notifier, OutboxNotifier, CLAIM_LEASE_SECONDS,
    },
    utils::time::{Clock, SharedClock},
};
use chrono::Duration;
use common::*;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

#[derive(Clone, Default)]
struct Receiver {
    seen: Arc<Mutex<Vec<(Option<String>, JsonValue)>>>,
    fail: bool,
}

async fn receive(
    State(receiver): State<Receiver>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> StatusCode {
    let secret = headers
        .get("x-webhook-secret")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    receiver.seen.lock().unwrap().push((secret, body));
    if receiver.fail {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn spawn_receiver(fail: bool) -> (String, Receiver) {
    let receiver = Receiver {
        fail,
        ..Default::default()
    };
    let app = Router::new()
        .route("/hooks/notifications", post(receive))
        .with_state(receiver.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/hooks/notifications", addr), receiver)
}

fn intent() -> NotificationIntent {
    NotificationIntent {
        kind: NotificationKind::StudentAssigned,
        recipient_id: Uuid::new_v4(),
        recipient_email: Some("asha@example.edu".into()),
        payload: json!({"testName": "Aptitude Round 1"}),
    }
}

#[tokio::test]
async fn delivers_queued_notification_once() {
    let h = Harness::new();
    let store: SharedStore = h.store.clone();
    let clock: SharedClock = h.clock.clone();
    let (url, receiver) = spawn_receiver(false).await;

    OutboxNotifier::new(store.clone(), clock.clone())
        .notify(intent())
        .await
        .unwrap();
    let queued = h.store.outbox_snapshot()[0].clone();
    assert_eq!(queued.status, DeliveryStatus::Pending);

    let worker = NotificationWorker::new(store, clock, url, "whsec_test".into());
    assert!(worker.run_once().await.unwrap());
    assert!(!worker.run_once().await.unwrap());

    let delivered = h.store.get_notification(queued.id).await.unwrap().unwrap();
    assert_eq!(delivered.status, DeliveryStatus::Success);
    assert_eq!(delivered.attempts, 1);
    assert_eq!(delivered.http_status, Some(200));

    let seen = receiver.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("whsec_test"));
    assert_eq!(seen[0].1["eventType"], "student_assigned");
    assert_eq!(seen[0].1["payload"]["testName"], "Aptitude Round 1");
}

#[tokio::test]
async fn failed_delivery_backs_off_then_gives_up() {
    let h = Harness::new();
    let store: SharedStore = h.store.clone();
    let clock: SharedClock = h.clock.clone();
    let (url, receiver) = spawn_receiver(true).await;

    OutboxNotifier::new(store.clone(), clock.clone())
        .notify(intent())
        .await
        .unwrap();
    let id = h.store.outbox_snapshot()[0].id;
    let worker = NotificationWorker::new(store, clock, url, "whsec_test".into());

    assert!(worker.run_once().await.unwrap());
    let log = h.store.get_notification(id).await.unwrap().unwrap();
    assert_eq!(log.status, DeliveryStatus::Pending);
    assert_eq!(log.http_status, Some(500));
    assert_eq!(log.next_retry_at, Some(h.clock.now() + Duration::seconds(30)));

    assert!(!worker.run_once().await.unwrap());

    h.clock.advance(Duration::seconds(30));
    assert!(worker.run_once().await.unwrap());
    let log = h.store.get_notification(id).await.unwrap().unwrap();
    assert_eq!(log.status, DeliveryStatus::Pending);
    assert_eq!(log.next_retry_at, Some(h.clock.now() + Duration::seconds(60)));

    h.clock.advance(Duration::seconds(60));
    assert!(worker.run_once().await.unwrap());
    let log = h.store.get_notification(id).await.unwrap().unwrap();
    assert_eq!(log.status, DeliveryStatus::Failed);
    assert_eq!(log.attempts, 3);
    assert_eq!(log.next_retry_at, None);

    h.clock.advance(Duration::hours(2));
    assert!(!worker.run_once().await.unwrap());
    assert_eq!(receiver.seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn abandoned_claim_is_redelivered_after_the_lease() {
    let h = Harness::new();
    let store: SharedStore = h.store.clone();
    let clock: SharedClock = h.clock.clone();
    let (url, receiver) = spawn_receiver(false).await;

    OutboxNotifier::new(store.clone(), clock.clone())
        .notify(intent())
        .await
        .unwrap();
    let id = h.store.outbox_snapshot()[0].id;

    // A worker that claims and then dies before reporting.
    let now = h.clock.now();
    let lease = Duration::seconds(CLAIM_LEASE_SECONDS);
    let claimed = store
        .claim_pending_notification(now, now + lease)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status, DeliveryStatus::Sending);

    let worker = NotificationWorker::new(store, clock, url, "whsec_test".into());
    assert!(!worker.run_once().await.unwrap());

    h.clock.advance(lease);
    assert!(worker.run_once().await.unwrap());
    let log = h.store.get_notification(id).await.unwrap().unwrap();
    assert_eq!(log.status, DeliveryStatus::Success);
    assert_eq!(log.attempts, 1);
    assert_eq!(receiver.seen.lock().unwrap().len(), 1);
}
