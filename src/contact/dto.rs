use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// Sanitized submission handed to the notification channels.
#[derive(Debug, Clone)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Sent,
    Failed,
}

/// Per-channel delivery outcome; any channel may fail without failing the
/// submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReport {
    pub email: ChannelStatus,
    pub relay: ChannelStatus,
    pub auto_reply: ChannelStatus,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub notifications: NotificationReport,
}

#[derive(Debug, Serialize)]
pub struct ContactTestResponse {
    pub success: bool,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
