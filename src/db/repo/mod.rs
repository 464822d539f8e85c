//! Repository layer for database operations.
//!
//! `Repository` owns the pool and offers pool-level reads. Statements that must
//! run inside a caller's transaction are free functions taking
//! `&mut SqliteConnection`, organized by concern:
//! - `wallets.rs` - users, main wallets, sub-wallets, bonuses, wallet log
//! - `transfers.rs` - P2P transfers, user limits, payment requests
//! - `groups.rs` - group wallets, members, expenses
//! - `notifications.rs` - queued push notifications
//!
//! Transactions that read before writing must start with a write so SQLite
//! hands out the write lock before the read (see `wallets::bump_version`).

pub mod groups;
pub mod notifications;
pub mod transfers;
pub mod wallets;

use crate::domain::{Decimal, TimeMs, UserId};
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Row, Transaction};
use std::str::FromStr;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Account creation time, if the user exists.
    pub async fn get_user_created(&self, user: &UserId) -> Result<Option<TimeMs>, sqlx::Error> {
        let row = sqlx::query("SELECT created_ms FROM users WHERE id = ?")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| TimeMs::new(r.get::<i64, _>("created_ms"))))
    }
}

/// Insert the user row if absent. Returns true if it was created.
pub async fn insert_user_if_absent(
    conn: &mut SqliteConnection,
    user: &UserId,
    now: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (id, created_ms) VALUES (?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(user.as_str())
    .bind(now.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) fn decimal_col(row: &SqliteRow, col: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(col)?;
    Decimal::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

pub(crate) fn parse_col<T>(row: &SqliteRow, col: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(col)?;
    T::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: e.to_string().into(),
    })
}

pub(crate) fn time_col(row: &SqliteRow, col: &str) -> Result<TimeMs, sqlx::Error> {
    Ok(TimeMs::new(row.try_get::<i64, _>(col)?))
}

pub(crate) fn opt_time_col(row: &SqliteRow, col: &str) -> Result<Option<TimeMs>, sqlx::Error> {
    Ok(row.try_get::<Option<i64>, _>(col)?.map(TimeMs::new))
}

pub(crate) fn user_col(row: &SqliteRow, col: &str) -> Result<UserId, sqlx::Error> {
    Ok(UserId::new(row.try_get::<String, _>(col)?))
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}


#[cfg(test)]
mod tests {
    use super::test_support::setup_repo;
    use super::*;
    use crate::domain::{PlatformId, TransferStatus};

    #[tokio::test]
    async fn test_parse_col_accepts_any_displayable_error() {
        let (repo, _temp) = setup_repo().await;
        let row = sqlx::query(
            "SELECT 'fan_duel' AS platform, 'completed' AS status, 'nope' AS bad",
        )
        .fetch_one(repo.pool())
        .await
        .unwrap();

        let platform: PlatformId = parse_col(&row, "platform").unwrap();
        assert_eq!(platform, PlatformId::Fanduel);
        let status: TransferStatus = parse_col(&row, "status").unwrap();
        assert_eq!(status, TransferStatus::Completed);

        let err = parse_col::<PlatformId>(&row, "bad").unwrap_err();
        assert!(matches!(err, sqlx::Error::ColumnDecode { ref index, .. } if index == "bad"));
    }
}
