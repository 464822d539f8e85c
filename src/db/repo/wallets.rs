//! Main wallets, sub-wallets, bonus balances and the wallet transaction log.

use super::{decimal_col, new_id, opt_time_col, parse_col, time_col, user_col, Repository};
use crate::domain::{
    BonusBalance, BonusStatus, Decimal, MainWallet, PlatformId, SubWallet, TimeMs, UserId,
    WalletTxKind,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::collections::{BTreeMap, HashMap};

impl Repository {
    /// Full wallet view with every sub-wallet and bonus.
    pub async fn get_wallet(&self, user: &UserId) -> Result<Option<MainWallet>, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        load_wallet(&mut conn, user).await
    }

    /// Sub-wallets stamped with a version greater than `since`.
    pub async fn sub_wallets_changed_since(
        &self,
        user: &UserId,
        since: i64,
    ) -> Result<Vec<SubWallet>, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        load_sub_wallets(&mut conn, user, Some(since)).await
    }
}

pub async fn insert_wallet_if_absent(
    conn: &mut SqliteConnection,
    user: &UserId,
    now: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO wallets (user_id, bankroll_balance, version, created_ms, updated_ms)
        VALUES (?, '0', 0, ?, ?)
        ON CONFLICT(user_id) DO NOTHING
        "#,
    )
    .bind(user.as_str())
    .bind(now.as_ms())
    .bind(now.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Increment the wallet version and return the new value, or `None` if the
/// wallet does not exist. Being a write, this also takes the database write
/// lock for the rest of the transaction.
pub async fn bump_version(
    conn: &mut SqliteConnection,
    user: &UserId,
    now: TimeMs,
) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE wallets SET version = version + 1, updated_ms = ?
        WHERE user_id = ?
        RETURNING version
        "#,
    )
    .bind(now.as_ms())
    .bind(user.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|r| r.get::<i64, _>("version")))
}

/// Current (version, bankroll balance) without loading sub-wallets.
pub async fn wallet_header(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Option<(i64, Decimal)>, sqlx::Error> {
    let row = sqlx::query("SELECT version, bankroll_balance FROM wallets WHERE user_id = ?")
        .bind(user.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|r| Ok((r.try_get::<i64, _>("version")?, decimal_col(&r, "bankroll_balance")?)))
        .transpose()
}

pub async fn get_bankroll(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Option<Decimal>, sqlx::Error> {
    let row = sqlx::query("SELECT bankroll_balance FROM wallets WHERE user_id = ?")
        .bind(user.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|r| decimal_col(&r, "bankroll_balance")).transpose()
}

pub async fn set_bankroll(
    conn: &mut SqliteConnection,
    user: &UserId,
    balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE wallets SET bankroll_balance = ? WHERE user_id = ?")
        .bind(balance.to_canonical_string())
        .bind(user.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Insert an empty sub-wallet stamped with `version` if none exists for the
/// platform. Returns true if it was created.
pub async fn insert_sub_wallet_if_absent(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: PlatformId,
    version: i64,
    now: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO sub_wallets
            (user_id, platform, cash_balance, connected, status, created_ms, version)
        VALUES (?, ?, '0', 0, 'active', ?, ?)
        ON CONFLICT(user_id, platform) DO NOTHING
        "#,
    )
    .bind(user.as_str())
    .bind(platform.as_str())
    .bind(now.as_ms())
    .bind(version)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_sub_wallet(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: PlatformId,
) -> Result<Option<SubWallet>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT user_id, platform, cash_balance, connected, status, created_ms, version
        FROM sub_wallets
        WHERE user_id = ? AND platform = ?
        "#,
    )
    .bind(user.as_str())
    .bind(platform.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut wallet = row_to_sub_wallet(&row)?;
    wallet.bonus_balances = list_bonuses(conn, user, platform).await?;
    Ok(Some(wallet))
}

/// Set the cash balance and stamp the sub-wallet with `version`.
pub async fn set_sub_wallet_cash(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: PlatformId,
    cash: Decimal,
    version: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sub_wallets SET cash_balance = ?, version = ? WHERE user_id = ? AND platform = ?",
    )
    .bind(cash.to_canonical_string())
    .bind(version)
    .bind(user.as_str())
    .bind(platform.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn stamp_sub_wallet(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: PlatformId,
    version: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sub_wallets SET version = ? WHERE user_id = ? AND platform = ?")
        .bind(version)
        .bind(user.as_str())
        .bind(platform.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_bonus(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: PlatformId,
    bonus: &BonusBalance,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO bonus_balances
            (id, user_id, platform, amount, initial_amount, granted_ms, expires_ms, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&bonus.id)
    .bind(user.as_str())
    .bind(platform.as_str())
    .bind(bonus.amount.to_canonical_string())
    .bind(bonus.initial_amount.to_canonical_string())
    .bind(bonus.date_granted.as_ms())
    .bind(bonus.date_expires.map(|t| t.as_ms()))
    .bind(bonus.status.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_bonus(
    conn: &mut SqliteConnection,
    bonus_id: &str,
    amount: Decimal,
    status: BonusStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE bonus_balances SET amount = ?, status = ? WHERE id = ?")
        .bind(amount.to_canonical_string())
        .bind(status.as_str())
        .bind(bonus_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn list_bonuses(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: PlatformId,
) -> Result<Vec<BonusBalance>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, amount, initial_amount, granted_ms, expires_ms, status
        FROM bonus_balances
        WHERE user_id = ? AND platform = ?
        ORDER BY granted_ms, id
        "#,
    )
    .bind(user.as_str())
    .bind(platform.as_str())
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(row_to_bonus).collect()
}

/// Mark every active bonus whose expiry is at or before `now` as expired.
/// Returns the distinct sub-wallets that were touched.
pub async fn expire_due_bonuses(
    conn: &mut SqliteConnection,
    now: TimeMs,
) -> Result<Vec<(UserId, PlatformId)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        UPDATE bonus_balances SET status = 'expired'
        WHERE status = 'active' AND expires_ms IS NOT NULL AND expires_ms <= ?
        RETURNING user_id, platform
        "#,
    )
    .bind(now.as_ms())
    .fetch_all(&mut *conn)
    .await?;

    let mut touched = Vec::new();
    for row in &rows {
        let key = (user_col(row, "user_id")?, parse_col::<PlatformId>(row, "platform")?);
        if !touched.contains(&key) {
            touched.push(key);
        }
    }
    Ok(touched)
}

pub async fn insert_wallet_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: Option<PlatformId>,
    kind: WalletTxKind,
    amount: Decimal,
    reference: Option<&str>,
    now: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (id, user_id, platform, kind, amount, reference, created_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(user.as_str())
    .bind(platform.map(|p| p.as_str()))
    .bind(kind.as_str())
    .bind(amount.to_canonical_string())
    .bind(reference)
    .bind(now.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn count_wallet_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    kind: WalletTxKind,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM wallet_transactions WHERE user_id = ? AND kind = ?",
    )
    .bind(user.as_str())
    .bind(kind.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.get::<i64, _>("n"))
}

pub async fn load_wallet(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Option<MainWallet>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT bankroll_balance, version, created_ms FROM wallets WHERE user_id = ?",
    )
    .bind(user.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let sub_wallets = load_sub_wallets(conn, user, None)
        .await?
        .into_iter()
        .map(|w| (w.platform, w))
        .collect::<BTreeMap<_, _>>();

    Ok(Some(MainWallet {
        user: user.clone(),
        bankroll_balance: decimal_col(&row, "bankroll_balance")?,
        version: row.get::<i64, _>("version"),
        created: time_col(&row, "created_ms")?,
        sub_wallets,
    }))
}

/// Sub-wallets for `user`, optionally only those stamped after a version.
pub async fn load_sub_wallets(
    conn: &mut SqliteConnection,
    user: &UserId,
    since_version: Option<i64>,
) -> Result<Vec<SubWallet>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, platform, cash_balance, connected, status, created_ms, version
        FROM sub_wallets
        WHERE user_id = ? AND version > ?
        ORDER BY platform
        "#,
    )
    .bind(user.as_str())
    .bind(since_version.unwrap_or(i64::MIN))
    .fetch_all(&mut *conn)
    .await?;

    let bonus_rows = sqlx::query(
        r#"
        SELECT id, platform, amount, initial_amount, granted_ms, expires_ms, status
        FROM bonus_balances
        WHERE user_id = ?
        ORDER BY granted_ms, id
        "#,
    )
    .bind(user.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let mut bonuses: HashMap<PlatformId, Vec<BonusBalance>> = HashMap::new();
    for row in &bonus_rows {
        let platform: PlatformId = parse_col(row, "platform")?;
        bonuses.entry(platform).or_default().push(row_to_bonus(row)?);
    }

    rows.iter()
        .map(|row| {
            let mut wallet = row_to_sub_wallet(row)?;
            wallet.bonus_balances = bonuses.remove(&wallet.platform).unwrap_or_default();
            Ok(wallet)
        })
        .collect()
}

fn row_to_sub_wallet(row: &SqliteRow) -> Result<SubWallet, sqlx::Error> {
    Ok(SubWallet {
        user: user_col(row, "user_id")?,
        platform: parse_col(row, "platform")?,
        cash_balance: decimal_col(row, "cash_balance")?,
        bonus_balances: Vec::new(),
        connected: row.try_get::<i64, _>("connected")? != 0,
        created: time_col(row, "created_ms")?,
        status: parse_col(row, "status")?,
        version: row.try_get::<i64, _>("version")?,
    })
}

fn row_to_bonus(row: &SqliteRow) -> Result<BonusBalance, sqlx::Error> {
    Ok(BonusBalance {
        id: row.try_get::<String, _>("id")?,
        amount: decimal_col(row, "amount")?,
        initial_amount: decimal_col(row, "initial_amount")?,
        date_granted: time_col(row, "granted_ms")?,
        date_expires: opt_time_col(row, "expires_ms")?,
        status: parse_col(row, "status")?,
    })
}
