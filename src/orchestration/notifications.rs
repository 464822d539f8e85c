//! Push notification queue polled by the client service worker.

use crate::db::repo::notifications::insert_notification;
use crate::db::Repository;
use crate::domain::{NewNotification, Notification, TimeMs, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<Repository>,
}

impl NotificationService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn enqueue(
        &self,
        notification: &NewNotification,
        now: TimeMs,
    ) -> Result<String, sqlx::Error> {
        let mut conn = self.repo.pool().acquire().await?;
        let id = insert_notification(&mut conn, notification, now).await?;
        debug!(user = %notification.user_id, tag = %notification.tag, "Queued notification");
        Ok(id)
    }

    /// Enqueue without failing the caller; errors are logged.
    pub async fn enqueue_best_effort(&self, notification: NewNotification, now: TimeMs) {
        if let Err(e) = self.enqueue(&notification, now).await {
            warn!(
                user = %notification.user_id,
                tag = %notification.tag,
                error = %e,
                "Failed to queue notification"
            );
        }
    }

    /// Undelivered notifications, marked delivered as they are returned.
    pub async fn pending(
        &self,
        user: &UserId,
        now: TimeMs,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        self.repo.take_pending_notifications(user, now).await
    }

    pub async fn dismiss(&self, user: &UserId, id: &str, now: TimeMs) -> Result<bool, sqlx::Error> {
        self.repo.dismiss_notification(user, id, now).await
    }
}
