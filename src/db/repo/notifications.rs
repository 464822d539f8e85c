//! Queued push notifications.

use super::{new_id, opt_time_col, time_col, user_col, Repository};
use crate::domain::{NewNotification, Notification, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

impl Repository {
    /// Undelivered notifications for `user`, oldest first. Marks them
    /// delivered at `now` in the same transaction.
    pub async fn take_pending_notifications(
        &self,
        user: &UserId,
        now: TimeMs,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let mut tx = self.begin().await?;
        let rows = sqlx::query(
            r#"
            UPDATE notifications SET delivered_ms = ?
            WHERE user_id = ? AND delivered_ms IS NULL AND dismissed_ms IS NULL
            RETURNING id, user_id, title, body, icon, action, tag,
                      created_ms, delivered_ms, dismissed_ms
            "#,
        )
        .bind(now.as_ms())
        .bind(user.as_str())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut notifications = rows
            .iter()
            .map(row_to_notification)
            .collect::<Result<Vec<_>, _>>()?;
        notifications.sort_by(|a, b| (a.created_ms, &a.id).cmp(&(b.created_ms, &b.id)));
        Ok(notifications)
    }

    /// Record a dismissal. Returns false if the id is unknown or belongs to
    /// someone else.
    pub async fn dismiss_notification(
        &self,
        user: &UserId,
        id: &str,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET dismissed_ms = COALESCE(dismissed_ms, ?)
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(now.as_ms())
        .bind(id)
        .bind(user.as_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub async fn insert_notification(
    conn: &mut SqliteConnection,
    notification: &NewNotification,
    now: TimeMs,
) -> Result<String, sqlx::Error> {
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, title, body, icon, action, tag, created_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(notification.user_id.as_str())
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(notification.icon.as_deref())
    .bind(notification.action.as_deref())
    .bind(&notification.tag)
    .bind(now.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

fn row_to_notification(row: &SqliteRow) -> Result<Notification, sqlx::Error> {
    Ok(Notification {
        id: row.try_get("id")?,
        user_id: user_col(row, "user_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        icon: row.try_get("icon")?,
        action: row.try_get("action")?,
        tag: row.try_get("tag")?,
        created_ms: time_col(row, "created_ms")?,
        delivered_ms: opt_time_col(row, "delivered_ms")?,
        dismissed_ms: opt_time_col(row, "dismissed_ms")?,
    })
}
