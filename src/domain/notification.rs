use crate::domain::{TimeMs, UserId};
use serde::Serialize;

/// A push notification queued for a user's service worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Path the client opens on click.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub tag: String,
    pub created_ms: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_ms: Option<TimeMs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismissed_ms: Option<TimeMs>,
}

/// Fields for a notification about to be queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub action: Option<String>,
    pub tag: String,
}
