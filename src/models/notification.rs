use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CollegeAssigned,
    CollegeDecision,
    StudentAssigned,
    AttemptSubmitted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::CollegeAssigned => "college_assigned",
            NotificationKind::CollegeDecision => "college_decision",
            NotificationKind::StudentAssigned => "student_assigned",
            NotificationKind::AttemptSubmitted => "attempt_submitted",
        }
    }
}

/// What should be sent and to whom; rendering and delivery happen elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub kind: NotificationKind,
    pub recipient_id: Uuid,
    pub recipient_email: Option<String>,
    pub payload: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sending,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sending => "sending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(DeliveryStatus::Pending),
            "sending" => Some(DeliveryStatus::Sending),
            "success" => Some(DeliveryStatus::Success),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

/// Outbox row for one notification intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLog {
    pub id: Uuid,
    pub event_type: String,
    pub recipient_id: Uuid,
    pub recipient_email: Option<String>,
    pub payload: JsonValue,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub http_status: Option<i32>,
    pub response_body: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationLog {
    pub fn from_intent(intent: NotificationIntent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: intent.kind.as_str().to_string(),
            recipient_id: intent.recipient_id,
            recipient_email: intent.recipient_email,
            payload: intent.payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            max_attempts: 3,
            http_status: None,
            response_body: None,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of one delivery try, written back to the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub http_status: Option<i32>,
    pub response_body: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
}
