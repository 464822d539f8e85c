//! P2P transfers, per-user spend limits and payment requests.

use super::{decimal_col, opt_time_col, parse_col, time_col, user_col, Repository};
use crate::domain::{
    P2PTransfer, PaymentRequest, PaymentRequestStatus, SpendWindow, TimeMs, TransferStatus,
    UserId, UserLimits,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

const TRANSFER_COLUMNS: &str = "id, sender_id, receiver_id, amount, note, status, risk_score, \
     failure_reason, created_ms, updated_ms, completed_ms";

const PAYMENT_REQUEST_COLUMNS: &str =
    "id, requester_id, payer_id, amount, note, status, transfer_id, created_ms, updated_ms";

impl Repository {
    pub async fn get_transfer(&self, id: &str) -> Result<Option<P2PTransfer>, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        get_transfer(&mut conn, id).await
    }

    /// Transfers sent or received by `user`, newest first.
    pub async fn list_transfers_for_user(
        &self,
        user: &UserId,
        limit: i64,
    ) -> Result<Vec<P2PTransfer>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM p2p_transfers WHERE sender_id = ? OR receiver_id = ? \
             ORDER BY created_ms DESC, id LIMIT ?",
            TRANSFER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(user.as_str())
            .bind(limit)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(row_to_transfer).collect()
    }

    /// Completed transfers from `sender` to `receiver`.
    pub async fn count_completed_transfers(
        &self,
        sender: &UserId,
        receiver: &UserId,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM p2p_transfers
            WHERE sender_id = ? AND receiver_id = ? AND status = 'completed'
            "#,
        )
        .bind(sender.as_str())
        .bind(receiver.as_str())
        .fetch_one(self.pool())
        .await?;
        Ok(row.get::<i64, _>("n"))
    }

    pub async fn get_limits(&self, user: &UserId) -> Result<Option<UserLimits>, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        get_limits(&mut conn, user).await
    }

    pub async fn get_payment_request(
        &self,
        id: &str,
    ) -> Result<Option<PaymentRequest>, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        get_payment_request(&mut conn, id).await
    }

    /// Requests where `user` is requester or payer, newest first.
    pub async fn list_payment_requests_for_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<PaymentRequest>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM payment_requests WHERE requester_id = ? OR payer_id = ? \
             ORDER BY created_ms DESC, id",
            PAYMENT_REQUEST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(user.as_str())
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(row_to_payment_request).collect()
    }
}

pub async fn insert_transfer(
    conn: &mut SqliteConnection,
    transfer: &P2PTransfer,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO p2p_transfers
            (id, sender_id, receiver_id, amount, note, status, risk_score,
             failure_reason, created_ms, updated_ms, completed_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&transfer.id)
    .bind(transfer.sender_id.as_str())
    .bind(transfer.receiver_id.as_str())
    .bind(transfer.amount.to_canonical_string())
    .bind(transfer.note.as_deref())
    .bind(transfer.status.as_str())
    .bind(transfer.risk_score.to_canonical_string())
    .bind(transfer.failure_reason.as_deref())
    .bind(transfer.created_ms.as_ms())
    .bind(transfer.updated_ms.as_ms())
    .bind(transfer.completed_ms.map(|t| t.as_ms()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_transfer(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<P2PTransfer>, sqlx::Error> {
    let sql = format!("SELECT {} FROM p2p_transfers WHERE id = ?", TRANSFER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_transfer).transpose()
}

/// Move a transfer from `from` to `to` only if it is still in `from`.
/// Returns false when another writer got there first.
pub async fn transition_transfer(
    conn: &mut SqliteConnection,
    id: &str,
    from: TransferStatus,
    to: TransferStatus,
    failure_reason: Option<&str>,
    now: TimeMs,
) -> Result<bool, sqlx::Error> {
    let completed_ms = (to == TransferStatus::Completed).then(|| now.as_ms());
    let result = sqlx::query(
        r#"
        UPDATE p2p_transfers
        SET status = ?, failure_reason = COALESCE(?, failure_reason),
            updated_ms = ?, completed_ms = COALESCE(?, completed_ms)
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to.as_str())
    .bind(failure_reason)
    .bind(now.as_ms())
    .bind(completed_ms)
    .bind(id)
    .bind(from.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fail every transfer left in `pending` or `processing` since before
/// `cutoff`. Returns the ids that were failed.
pub async fn fail_stale_transfers(
    conn: &mut SqliteConnection,
    cutoff: TimeMs,
    reason: &str,
    now: TimeMs,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        UPDATE p2p_transfers
        SET status = 'failed', failure_reason = ?, updated_ms = ?
        WHERE status IN ('pending', 'processing') AND updated_ms < ?
        RETURNING id
        "#,
    )
    .bind(reason)
    .bind(now.as_ms())
    .bind(cutoff.as_ms())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(|r| r.get::<String, _>("id")).collect())
}

pub async fn get_limits(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Option<UserLimits>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT per_transaction_limit, daily_limit, weekly_limit, monthly_limit,
               daily_spent, daily_window_start, weekly_spent, weekly_window_start,
               monthly_spent, monthly_window_start
        FROM user_limits WHERE user_id = ?
        "#,
    )
    .bind(user.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(row_to_limits).transpose()
}

pub async fn upsert_limits(
    conn: &mut SqliteConnection,
    user: &UserId,
    limits: &UserLimits,
    now: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO user_limits
            (user_id, per_transaction_limit, daily_limit, weekly_limit, monthly_limit,
             daily_spent, daily_window_start, weekly_spent, weekly_window_start,
             monthly_spent, monthly_window_start, updated_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            per_transaction_limit = excluded.per_transaction_limit,
            daily_limit = excluded.daily_limit,
            weekly_limit = excluded.weekly_limit,
            monthly_limit = excluded.monthly_limit,
            daily_spent = excluded.daily_spent,
            daily_window_start = excluded.daily_window_start,
            weekly_spent = excluded.weekly_spent,
            weekly_window_start = excluded.weekly_window_start,
            monthly_spent = excluded.monthly_spent,
            monthly_window_start = excluded.monthly_window_start,
            updated_ms = excluded.updated_ms
        "#,
    )
    .bind(user.as_str())
    .bind(limits.per_transaction_limit.to_canonical_string())
    .bind(limits.daily_limit.to_canonical_string())
    .bind(limits.weekly_limit.to_canonical_string())
    .bind(limits.monthly_limit.to_canonical_string())
    .bind(limits.daily.spent.to_canonical_string())
    .bind(limits.daily.window_start.as_ms())
    .bind(limits.weekly.spent.to_canonical_string())
    .bind(limits.weekly.window_start.as_ms())
    .bind(limits.monthly.spent.to_canonical_string())
    .bind(limits.monthly.window_start.as_ms())
    .bind(now.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert default limits for `user` if no row exists yet.
pub async fn ensure_limits_row(
    conn: &mut SqliteConnection,
    user: &UserId,
    now: TimeMs,
) -> Result<(), sqlx::Error> {
    let defaults = UserLimits::default();
    sqlx::query(
        r#"
        INSERT INTO user_limits
            (user_id, per_transaction_limit, daily_limit, weekly_limit, monthly_limit,
             daily_spent, daily_window_start, weekly_spent, weekly_window_start,
             monthly_spent, monthly_window_start, updated_ms)
        VALUES (?, ?, ?, ?, ?, '0', 0, '0', 0, '0', 0, ?)
        ON CONFLICT(user_id) DO NOTHING
        "#,
    )
    .bind(user.as_str())
    .bind(defaults.per_transaction_limit.to_canonical_string())
    .bind(defaults.daily_limit.to_canonical_string())
    .bind(defaults.weekly_limit.to_canonical_string())
    .bind(defaults.monthly_limit.to_canonical_string())
    .bind(now.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Replace the four limit values, leaving spend counters untouched.
pub async fn set_limit_values(
    conn: &mut SqliteConnection,
    user: &UserId,
    limits: &UserLimits,
    now: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE user_limits
        SET per_transaction_limit = ?, daily_limit = ?, weekly_limit = ?, monthly_limit = ?,
            updated_ms = ?
        WHERE user_id = ?
        "#,
    )
    .bind(limits.per_transaction_limit.to_canonical_string())
    .bind(limits.daily_limit.to_canonical_string())
    .bind(limits.weekly_limit.to_canonical_string())
    .bind(limits.monthly_limit.to_canonical_string())
    .bind(now.as_ms())
    .bind(user.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_payment_request(
    conn: &mut SqliteConnection,
    request: &PaymentRequest,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO payment_requests
            (id, requester_id, payer_id, amount, note, status, transfer_id, created_ms, updated_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&request.id)
    .bind(request.requester_id.as_str())
    .bind(request.payer_id.as_str())
    .bind(request.amount.to_canonical_string())
    .bind(request.note.as_deref())
    .bind(request.status.as_str())
    .bind(request.transfer_id.as_deref())
    .bind(request.created_ms.as_ms())
    .bind(request.updated_ms.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_payment_request(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<PaymentRequest>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM payment_requests WHERE id = ?",
        PAYMENT_REQUEST_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_payment_request).transpose()
}

/// Settle a pending request. Returns false if it was no longer pending.
pub async fn resolve_payment_request(
    conn: &mut SqliteConnection,
    id: &str,
    status: PaymentRequestStatus,
    transfer_id: Option<&str>,
    now: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE payment_requests SET status = ?, transfer_id = ?, updated_ms = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(transfer_id)
    .bind(now.as_ms())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_transfer(row: &SqliteRow) -> Result<P2PTransfer, sqlx::Error> {
    Ok(P2PTransfer {
        id: row.try_get("id")?,
        sender_id: user_col(row, "sender_id")?,
        receiver_id: user_col(row, "receiver_id")?,
        amount: decimal_col(row, "amount")?,
        note: row.try_get("note")?,
        status: parse_col(row, "status")?,
        risk_score: decimal_col(row, "risk_score")?,
        failure_reason: row.try_get("failure_reason")?,
        created_ms: time_col(row, "created_ms")?,
        updated_ms: time_col(row, "updated_ms")?,
        completed_ms: opt_time_col(row, "completed_ms")?,
    })
}

fn row_to_limits(row: &SqliteRow) -> Result<UserLimits, sqlx::Error> {
    let window = |spent: &str, start: &str| -> Result<SpendWindow, sqlx::Error> {
        Ok(SpendWindow {
            spent: decimal_col(row, spent)?,
            window_start: time_col(row, start)?,
        })
    };
    Ok(UserLimits {
        per_transaction_limit: decimal_col(row, "per_transaction_limit")?,
        daily_limit: decimal_col(row, "daily_limit")?,
        weekly_limit: decimal_col(row, "weekly_limit")?,
        monthly_limit: decimal_col(row, "monthly_limit")?,
        daily: window("daily_spent", "daily_window_start")?,
        weekly: window("weekly_spent", "weekly_window_start")?,
        monthly: window("monthly_spent", "monthly_window_start")?,
    })
}

fn row_to_payment_request(row: &SqliteRow) -> Result<PaymentRequest, sqlx::Error> {
    Ok(PaymentRequest {
        id: row.try_get("id")?,
        requester_id: user_col(row, "requester_id")?,
        payer_id: user_col(row, "payer_id")?,
        amount: decimal_col(row, "amount")?,
        note: row.try_get("note")?,
        status: parse_col(row, "status")?,
        transfer_id: row.try_get("transfer_id")?,
        created_ms: time_col(row, "created_ms")?,
        updated_ms: time_col(row, "updated_ms")?,
    })
}
