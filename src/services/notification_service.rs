use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

use crate::database::store::SharedStore;
use crate::error::Result;
use crate::models::notification::{
    DeliveryOutcome, DeliveryStatus, NotificationIntent, NotificationLog,
};
use crate::utils::time::SharedClock;

/// Outbound seam for "someone should be told" events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, intent: NotificationIntent) -> Result<()>;
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Sends an intent and swallows the failure; the calling operation has
/// already committed by the time it notifies.
pub async fn notify_quietly(notifier: &dyn Notifier, intent: NotificationIntent) {
    let kind = intent.kind.as_str();
    let recipient = intent.recipient_id;
    if let Err(e) = notifier.notify(intent).await {
        tracing::warn!(error = %e, kind, %recipient, "notification dropped");
    }
}

/// Writes intents to the outbox table for the delivery worker.
#[derive(Clone)]
pub struct OutboxNotifier {
    store: SharedStore,
    clock: SharedClock,
}

impl OutboxNotifier {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn notify(&self, intent: NotificationIntent) -> Result<()> {
        let log = NotificationLog::from_intent(intent, self.clock.now());
        self.store.enqueue_notification(&log).await?;
        tracing::debug!(notification_id = %log.id, event = %log.event_type, "notification queued");
        Ok(())
    }
}

/// How long a claimed entry stays with one worker before another may
/// reclaim it.
pub const CLAIM_LEASE_SECONDS: i64 = 300;

#[derive(Clone)]
pub struct NotificationWorker {
    store: SharedStore,
    clock: SharedClock,
    client: Client,
    target_url: String,
    secret: String,
}

impl NotificationWorker {
    pub fn new(store: SharedStore, clock: SharedClock, target_url: String, secret: String) -> Self {
        Self {
            store,
            clock,
            client: Client::new(),
            target_url,
            secret,
        }
    }

    /// Delivers at most one due entry. Returns false when nothing was due.
    pub async fn run_once(&self) -> Result<bool> {
        let now = self.clock.now();
        let lease_until = now + Duration::seconds(CLAIM_LEASE_SECONDS);
        let Some(log) = self.store.claim_pending_notification(now, lease_until).await? else {
            return Ok(false);
        };

        let body = json!({
            "id": log.id,
            "eventType": log.event_type,
            "recipientId": log.recipient_id,
            "recipientEmail": log.recipient_email,
            "payload": log.payload,
        });
        let res = self
            .client
            .post(&self.target_url)
            .header("X-Webhook-Secret", &self.secret)
            .json(&body)
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await;

        let (http_status, response_body) = match res {
            Ok(resp) => {
                let status = resp.status().as_u16() as i32;
                let text = resp.text().await.unwrap_or_default();
                (Some(status), Some(text))
            }
            Err(err) => (None, Some(err.to_string())),
        };

        let outcome = next_outcome(&log, http_status, response_body, self.clock.now());
        match outcome.status {
            DeliveryStatus::Success => {
                tracing::info!(notification_id = %log.id, event = %log.event_type, "notification delivered")
            }
            DeliveryStatus::Pending => tracing::warn!(
                notification_id = %log.id,
                http_status = ?outcome.http_status,
                retry_at = ?outcome.next_retry_at,
                "notification delivery failed, will retry"
            ),
            _ => tracing::error!(
                notification_id = %log.id,
                http_status = ?outcome.http_status,
                "notification delivery gave up"
            ),
        }
        self.store.record_delivery(log.id, outcome).await?;
        Ok(true)
    }
}

/// Decides what a delivery try means for the outbox row: success on 2xx,
/// otherwise retry with doubling delay until `max_attempts` tries are spent.
pub fn next_outcome(
    log: &NotificationLog,
    http_status: Option<i32>,
    response_body: Option<String>,
    now: DateTime<Utc>,
) -> DeliveryOutcome {
    let delivered = matches!(http_status, Some(code) if (200..300).contains(&code));
    if delivered {
        return DeliveryOutcome {
            status: DeliveryStatus::Success,
            http_status,
            response_body,
            next_retry_at: None,
        };
    }

    let tries = log.attempts + 1;
    if tries < log.max_attempts {
        let delay = (30_i64 << (tries - 1).clamp(0, 16)).min(3600);
        DeliveryOutcome {
            status: DeliveryStatus::Pending,
            http_status,
            response_body,
            next_retry_at: Some(now + Duration::seconds(delay)),
        }
    } else {
        DeliveryOutcome {
            status: DeliveryStatus::Failed,
            http_status,
            response_body,
            next_retry_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationKind;
    use uuid::Uuid;

    fn log_with_attempts(attempts: i32) -> NotificationLog {
        let mut log = NotificationLog::from_intent(
            NotificationIntent {
                kind: NotificationKind::StudentAssigned,
                recipient_id: Uuid::new_v4(),
                recipient_email: None,
                payload: json!({}),
            },
            Utc::now(),
        );
        log.attempts = attempts;
        log
    }

    #[test]
    fn success_clears_retry() {
        let outcome = next_outcome(&log_with_attempts(0), Some(204), None, Utc::now());
        assert_eq!(outcome.status, DeliveryStatus::Success);
        assert!(outcome.next_retry_at.is_none());
    }

    #[test]
    fn failures_back_off_then_give_up() {
        let now = Utc::now();
        let first = next_outcome(&log_with_attempts(0), Some(500), None, now);
        assert_eq!(first.status, DeliveryStatus::Pending);
        assert_eq!(first.next_retry_at, Some(now + Duration::seconds(30)));

        let second = next_outcome(&log_with_attempts(1), None, Some("timeout".into()), now);
        assert_eq!(second.next_retry_at, Some(now + Duration::seconds(60)));

        let last = next_outcome(&log_with_attempts(2), Some(502), None, now);
        assert_eq!(last.status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn quiet_notify_swallows_errors() {
        let mut mock = MockNotifier::new();
        mock.expect_notify()
            .times(1)
            .returning(|_| Err(crate::error::Error::Internal("smtp down".into())));

        notify_quietly(
            &mock,
            NotificationIntent {
                kind: NotificationKind::CollegeAssigned,
                recipient_id: Uuid::new_v4(),
                recipient_email: Some("dean@example.edu".into()),
                payload: json!({"testName": "Aptitude"}),
            },
        )
        .await;
    }
}
