//! Group wallets, their members and recorded expenses.

use super::{decimal_col, time_col, user_col, Repository};
use crate::domain::{Decimal, Expense, GroupWallet, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;

impl Repository {
    pub async fn get_group(&self, id: &str) -> Result<Option<GroupWallet>, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        load_group(&mut conn, id).await
    }
}

pub async fn insert_group(
    conn: &mut SqliteConnection,
    id: &str,
    name: &str,
    now: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO group_wallets (id, name, created_ms) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(now.as_ms())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// No-op write on the group row. Returns false if the group does not exist.
pub async fn touch_group(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE group_wallets SET name = name WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_member(
    conn: &mut SqliteConnection,
    group_id: &str,
    user: &UserId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO group_members (group_id, user_id, balance) VALUES (?, ?, '0')
        ON CONFLICT(group_id, user_id) DO NOTHING
        "#,
    )
    .bind(group_id)
    .bind(user.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn member_balances(
    conn: &mut SqliteConnection,
    group_id: &str,
) -> Result<BTreeMap<UserId, Decimal>, sqlx::Error> {
    let rows = sqlx::query("SELECT user_id, balance FROM group_members WHERE group_id = ?")
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter()
        .map(|r| Ok((user_col(r, "user_id")?, decimal_col(r, "balance")?)))
        .collect()
}

pub async fn set_member_balance(
    conn: &mut SqliteConnection,
    group_id: &str,
    user: &UserId,
    balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE group_members SET balance = ? WHERE group_id = ? AND user_id = ?")
        .bind(balance.to_canonical_string())
        .bind(group_id)
        .bind(user.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_expense(
    conn: &mut SqliteConnection,
    group_id: &str,
    expense: &Expense,
) -> Result<(), sqlx::Error> {
    // Shares are stored as canonical decimal strings to keep them exact.
    let shares: BTreeMap<&str, String> = expense
        .shares
        .iter()
        .map(|(user, share)| (user.as_str(), share.to_canonical_string()))
        .collect();
    let shares_json = serde_json::to_string(&shares)
        .map_err(|e| sqlx::Error::Protocol(format!("encode shares: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO group_expenses
            (id, group_id, paid_by, amount, description, shares_json, created_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&expense.id)
    .bind(group_id)
    .bind(expense.paid_by.as_str())
    .bind(expense.amount.to_canonical_string())
    .bind(&expense.description)
    .bind(shares_json)
    .bind(expense.created_ms.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn load_group(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<GroupWallet>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name, created_ms FROM group_wallets WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let member_balances = member_balances(conn, id).await?;
    let expense_rows = sqlx::query(
        r#"
        SELECT id, paid_by, amount, description, shares_json, created_ms
        FROM group_expenses WHERE group_id = ?
        ORDER BY created_ms, id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    let expenses = expense_rows
        .iter()
        .map(row_to_expense)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(GroupWallet {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_ms: time_col(&row, "created_ms")?,
        member_balances,
        expenses,
    }))
}

fn row_to_expense(row: &SqliteRow) -> Result<Expense, sqlx::Error> {
    let raw: String = row.try_get("shares_json")?;
    let decode_err = |e: String| sqlx::Error::ColumnDecode {
        index: "shares_json".to_string(),
        source: e.into(),
    };
    let encoded: BTreeMap<String, String> =
        serde_json::from_str(&raw).map_err(|e| decode_err(e.to_string()))?;
    let shares = encoded
        .into_iter()
        .map(|(user, share)| {
            Decimal::from_str(&share)
                .map(|d| (UserId::new(user), d))
                .map_err(|e| decode_err(e.to_string()))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(Expense {
        id: row.try_get("id")?,
        paid_by: user_col(row, "paid_by")?,
        amount: decimal_col(row, "amount")?,
        description: row.try_get("description")?,
        shares,
        created_ms: time_col(row, "created_ms")?,
    })
}
