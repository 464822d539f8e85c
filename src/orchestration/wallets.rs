//! Wallet mutations: initialization, cash, bonuses and the pooled bankroll.
//!
//! Every mutation runs in one transaction that starts by bumping the main
//! wallet version, stamps the touched sub-wallet with the new version and
//! appends a wallet transaction entry.

use crate::db::repo::{insert_user_if_absent, wallets};
use crate::db::Repository;
use crate::domain::{
    BonusBalance, BonusStatus, Decimal, MainWallet, PlatformId, SubWallet, SubWalletStatus,
    TimeMs, UserId, WalletTxKind,
};
use crate::engine::{active_bonus_total, apply_bonus_multiplier, plan_bonus_draw};
use sqlx::SqliteConnection;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet not found for user {0}")]
    WalletNotFound(UserId),
    #[error("no {platform} sub-wallet for user {user}")]
    SubWalletNotFound { user: UserId, platform: PlatformId },
    #[error("{0} sub-wallet is not active")]
    SubWalletInactive(PlatformId),
    #[error("{0}")]
    Invalid(String),
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("insufficient bonus balance: available {available}, requested {requested}")]
    InsufficientBonus {
        available: Decimal,
        requested: Decimal,
    },
    #[error("bonuses are not offered in {0}")]
    BonusNotPermitted(String),
    #[error("version conflict: expected {expected}, current {current}")]
    VersionConflict { expected: i64, current: i64 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Sub-wallets changed after a client's last seen version.
#[derive(Debug, Clone)]
pub struct WalletChanges {
    pub version: i64,
    pub bankroll_balance: Decimal,
    pub sub_wallets: Vec<SubWallet>,
}

#[derive(Debug, Clone)]
pub struct BonusGrant {
    pub amount: Decimal,
    pub expires: Option<TimeMs>,
    /// When set, the amount is scaled by that state's promotional multiplier.
    pub state_code: Option<String>,
}

#[derive(Clone)]
pub struct WalletService {
    repo: Arc<Repository>,
    default_platforms: Vec<PlatformId>,
}

impl WalletService {
    pub fn new(repo: Arc<Repository>, default_platforms: Vec<PlatformId>) -> Self {
        Self {
            repo,
            default_platforms,
        }
    }

    /// Create the user, main wallet and default sub-wallets where missing.
    /// Concurrent calls merge: existing rows are never overwritten.
    pub async fn initialize_user_wallet(
        &self,
        user: &UserId,
        now: TimeMs,
    ) -> Result<MainWallet, WalletError> {
        let mut tx = self.repo.begin().await?;
        let user_created = insert_user_if_absent(&mut tx, user, now).await?;
        wallets::insert_wallet_if_absent(&mut tx, user, now).await?;

        let mut created = Vec::new();
        for platform in &self.default_platforms {
            if wallets::insert_sub_wallet_if_absent(&mut tx, user, *platform, 0, now).await? {
                created.push(*platform);
            }
        }

        if !created.is_empty() {
            let version = bump(&mut tx, user, now).await?;
            for platform in &created {
                wallets::stamp_sub_wallet(&mut tx, user, *platform, version).await?;
            }
        }

        let wallet = wallets::load_wallet(&mut tx, user)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(user.clone()))?;
        tx.commit().await?;

        info!(
            user = %user,
            new_user = user_created,
            sub_wallets_created = created.len(),
            "Initialized wallet"
        );
        Ok(wallet)
    }

    /// Add one platform's sub-wallet. Returns false if it already existed.
    pub async fn create_sub_wallet(
        &self,
        user: &UserId,
        platform: PlatformId,
        now: TimeMs,
    ) -> Result<bool, WalletError> {
        let mut tx = self.repo.begin().await?;
        let version = bump(&mut tx, user, now).await?;
        let created =
            wallets::insert_sub_wallet_if_absent(&mut tx, user, platform, version, now).await?;
        if created {
            tx.commit().await?;
            info!(user = %user, platform = %platform, "Created sub-wallet");
        }
        // Dropping the transaction discards the version bump.
        Ok(created)
    }

    pub async fn get_wallet(&self, user: &UserId) -> Result<MainWallet, WalletError> {
        self.repo
            .get_wallet(user)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(user.clone()))
    }

    pub async fn changes_since(
        &self,
        user: &UserId,
        since_version: i64,
    ) -> Result<WalletChanges, WalletError> {
        let mut tx = self.repo.begin().await?;
        let (version, bankroll_balance) = wallets::wallet_header(&mut tx, user)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(user.clone()))?;
        let sub_wallets = wallets::load_sub_wallets(&mut tx, user, Some(since_version)).await?;
        tx.commit().await?;

        Ok(WalletChanges {
            version,
            bankroll_balance,
            sub_wallets,
        })
    }

    /// Credit (positive `delta`) or debit a sub-wallet's cash balance.
    ///
    /// With `expected_version` set, the call fails with `VersionConflict`
    /// unless the wallet is still at that version.
    pub async fn adjust_cash(
        &self,
        user: &UserId,
        platform: PlatformId,
        delta: Decimal,
        expected_version: Option<i64>,
        reference: Option<&str>,
        now: TimeMs,
    ) -> Result<SubWallet, WalletError> {
        if delta.is_zero() || !delta.has_cent_precision() {
            return Err(WalletError::Invalid(
                "amount must be non-zero with at most two decimals".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;
        let version = bump(&mut tx, user, now).await?;
        if let Some(expected) = expected_version {
            let current = version - 1;
            if expected != current {
                return Err(WalletError::VersionConflict { expected, current });
            }
        }

        let sub_wallet = active_sub_wallet(&mut tx, user, platform).await?;
        let new_balance = sub_wallet.cash_balance + delta;
        if new_balance.is_negative() {
            return Err(WalletError::InsufficientFunds {
                available: sub_wallet.cash_balance,
                requested: -delta,
            });
        }

        wallets::set_sub_wallet_cash(&mut tx, user, platform, new_balance, version).await?;
        wallets::insert_wallet_tx(
            &mut tx,
            user,
            Some(platform),
            WalletTxKind::CashAdjustment,
            delta,
            reference,
            now,
        )
        .await?;
        let updated = reload_sub_wallet(&mut tx, user, platform).await?;
        tx.commit().await?;

        debug!(user = %user, platform = %platform, delta = %delta, "Adjusted cash");
        Ok(updated)
    }

    pub async fn grant_bonus(
        &self,
        user: &UserId,
        platform: PlatformId,
        grant: BonusGrant,
        now: TimeMs,
    ) -> Result<BonusBalance, WalletError> {
        if !grant.amount.is_positive() || !grant.amount.has_cent_precision() {
            return Err(WalletError::Invalid(
                "bonus amount must be positive with at most two decimals".to_string(),
            ));
        }
        if matches!(grant.expires, Some(expires) if expires <= now) {
            return Err(WalletError::Invalid(
                "bonus expiry must be in the future".to_string(),
            ));
        }

        let amount = match grant.state_code.as_deref() {
            Some(state) => {
                let scaled = apply_bonus_multiplier(grant.amount, Some(state));
                if !scaled.is_positive() {
                    return Err(WalletError::BonusNotPermitted(state.to_ascii_uppercase()));
                }
                scaled
            }
            None => grant.amount,
        };

        let bonus = BonusBalance {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            initial_amount: amount,
            date_granted: now,
            date_expires: grant.expires,
            status: BonusStatus::Active,
        };

        let mut tx = self.repo.begin().await?;
        let version = bump(&mut tx, user, now).await?;
        active_sub_wallet(&mut tx, user, platform).await?;
        wallets::insert_bonus(&mut tx, user, platform, &bonus).await?;
        wallets::stamp_sub_wallet(&mut tx, user, platform, version).await?;
        wallets::insert_wallet_tx(
            &mut tx,
            user,
            Some(platform),
            WalletTxKind::BonusGrant,
            amount,
            Some(&bonus.id),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(user = %user, platform = %platform, amount = %amount, "Granted bonus");
        Ok(bonus)
    }

    /// Spend `amount` of bonus money, soonest-expiring bonuses first.
    pub async fn consume_bonus(
        &self,
        user: &UserId,
        platform: PlatformId,
        amount: Decimal,
        now: TimeMs,
    ) -> Result<SubWallet, WalletError> {
        if !amount.is_positive() || !amount.has_cent_precision() {
            return Err(WalletError::Invalid(
                "amount must be positive with at most two decimals".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;
        let version = bump(&mut tx, user, now).await?;
        let sub_wallet = active_sub_wallet(&mut tx, user, platform).await?;
        let draw = plan_bonus_draw(&sub_wallet.bonus_balances, amount, now).ok_or_else(|| {
            WalletError::InsufficientBonus {
                available: active_bonus_total(&sub_wallet.bonus_balances, now),
                requested: amount,
            }
        })?;

        for (bonus_id, remaining, status) in &draw.updates {
            wallets::update_bonus(&mut tx, bonus_id, *remaining, *status).await?;
        }
        wallets::stamp_sub_wallet(&mut tx, user, platform, version).await?;
        wallets::insert_wallet_tx(
            &mut tx,
            user,
            Some(platform),
            WalletTxKind::BonusConsume,
            -draw.consumed,
            None,
            now,
        )
        .await?;
        let updated = reload_sub_wallet(&mut tx, user, platform).await?;
        tx.commit().await?;

        debug!(user = %user, platform = %platform, consumed = %draw.consumed, "Consumed bonus");
        Ok(updated)
    }

    /// Credit the pooled bankroll that funds P2P transfers.
    pub async fn deposit_bankroll(
        &self,
        user: &UserId,
        amount: Decimal,
        reference: Option<&str>,
        now: TimeMs,
    ) -> Result<MainWallet, WalletError> {
        if !amount.is_positive() || !amount.has_cent_precision() {
            return Err(WalletError::Invalid(
                "amount must be positive with at most two decimals".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;
        bump(&mut tx, user, now).await?;
        let balance = wallets::get_bankroll(&mut tx, user)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(user.clone()))?;
        wallets::set_bankroll(&mut tx, user, balance + amount).await?;
        wallets::insert_wallet_tx(
            &mut tx,
            user,
            None,
            WalletTxKind::BankrollDeposit,
            amount,
            reference,
            now,
        )
        .await?;
        let wallet = wallets::load_wallet(&mut tx, user)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(user.clone()))?;
        tx.commit().await?;

        info!(user = %user, amount = %amount, "Bankroll deposit");
        Ok(wallet)
    }

    /// Persist the expiry of bonuses past their expiry date. Returns the
    /// number of sub-wallets touched.
    pub async fn sweep_expired_bonuses(&self, now: TimeMs) -> Result<usize, WalletError> {
        let mut tx = self.repo.begin().await?;
        let touched = wallets::expire_due_bonuses(&mut tx, now).await?;
        for (user, platform) in &touched {
            if let Some(version) = wallets::bump_version(&mut tx, user, now).await? {
                wallets::stamp_sub_wallet(&mut tx, user, *platform, version).await?;
            }
        }
        tx.commit().await?;

        if !touched.is_empty() {
            info!(sub_wallets = touched.len(), "Expired bonuses");
        }
        Ok(touched.len())
    }
}

async fn bump(conn: &mut SqliteConnection, user: &UserId, now: TimeMs) -> Result<i64, WalletError> {
    wallets::bump_version(conn, user, now)
        .await?
        .ok_or_else(|| WalletError::WalletNotFound(user.clone()))
}

async fn active_sub_wallet(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: PlatformId,
) -> Result<SubWallet, WalletError> {
    let sub_wallet = reload_sub_wallet(conn, user, platform).await?;
    if sub_wallet.status != SubWalletStatus::Active {
        return Err(WalletError::SubWalletInactive(platform));
    }
    Ok(sub_wallet)
}

async fn reload_sub_wallet(
    conn: &mut SqliteConnection,
    user: &UserId,
    platform: PlatformId,
) -> Result<SubWallet, WalletError> {
    wallets::get_sub_wallet(conn, user, platform)
        .await?
        .ok_or_else(|| WalletError::SubWalletNotFound {
            user: user.clone(),
            platform,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::setup_repo;
    use crate::domain::MS_PER_DAY;

    const NOW: TimeMs = TimeMs(1_715_778_000_000);

    fn alice() -> UserId {
        UserId::new("alice".to_string())
    }

    async fn service() -> (WalletService, tempfile::TempDir) {
        let (repo, dir) = setup_repo().await;
        let service = WalletService::new(
            repo,
            vec![PlatformId::Fanduel, PlatformId::Draftkings, PlatformId::Sleeper],
        );
        (service, dir)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (service, _dir) = service().await;
        let first = service.initialize_user_wallet(&alice(), NOW).await.unwrap();
        assert_eq!(first.sub_wallets.len(), 3);
        assert_eq!(first.version, 1);

        service
            .adjust_cash(&alice(), PlatformId::Fanduel, Decimal::from_units(40), None, None, NOW)
            .await
            .unwrap();

        let second = service.initialize_user_wallet(&alice(), NOW).await.unwrap();
        assert_eq!(second.sub_wallets.len(), 3);
        assert_eq!(
            second.sub_wallets[&PlatformId::Fanduel].cash_balance,
            Decimal::from_units(40)
        );
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn test_concurrent_initialization_merges() {
        let (service, _dir) = service().await;
        let user = alice();
        let a = service.clone();
        let b = service.clone();
        let (ra, rb) = tokio::join!(
            a.initialize_user_wallet(&user, NOW),
            b.initialize_user_wallet(&user, NOW)
        );
        ra.unwrap();
        rb.unwrap();

        let wallet = service.get_wallet(&alice()).await.unwrap();
        assert_eq!(wallet.sub_wallets.len(), 3);
    }

    #[tokio::test]
    async fn test_create_sub_wallet_reports_existing() {
        let (service, _dir) = service().await;
        service.initialize_user_wallet(&alice(), NOW).await.unwrap();

        assert!(service
            .create_sub_wallet(&alice(), PlatformId::Betmgm, NOW)
            .await
            .unwrap());
        assert!(!service
            .create_sub_wallet(&alice(), PlatformId::Betmgm, NOW)
            .await
            .unwrap());

        let wallet = service.get_wallet(&alice()).await.unwrap();
        assert_eq!(wallet.version, 2);
    }

    #[tokio::test]
    async fn test_adjust_cash_rejects_overdraft_and_stale_version() {
        let (service, _dir) = service().await;
        service.initialize_user_wallet(&alice(), NOW).await.unwrap();

        let err = service
            .adjust_cash(&alice(), PlatformId::Fanduel, Decimal::from_units(-5), None, None, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));

        let err = service
            .adjust_cash(&alice(), PlatformId::Fanduel, Decimal::from_units(5), Some(0), None, NOW)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::VersionConflict {
                expected: 0,
                current: 1
            }
        ));

        let updated = service
            .adjust_cash(&alice(), PlatformId::Fanduel, Decimal::from_units(5), Some(1), None, NOW)
            .await
            .unwrap();
        assert_eq!(updated.cash_balance, Decimal::from_units(5));
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_changes_since_returns_only_touched_sub_wallets() {
        let (service, _dir) = service().await;
        let wallet = service.initialize_user_wallet(&alice(), NOW).await.unwrap();

        service
            .adjust_cash(&alice(), PlatformId::Sleeper, Decimal::from_units(12), None, None, NOW)
            .await
            .unwrap();

        let changes = service.changes_since(&alice(), wallet.version).await.unwrap();
        assert_eq!(changes.version, wallet.version + 1);
        assert_eq!(changes.sub_wallets.len(), 1);
        assert_eq!(changes.sub_wallets[0].platform, PlatformId::Sleeper);
    }

    #[tokio::test]
    async fn test_grant_bonus_applies_state_multiplier() {
        let (service, _dir) = service().await;
        service.initialize_user_wallet(&alice(), NOW).await.unwrap();

        let grant = BonusGrant {
            amount: Decimal::from_units(20),
            expires: None,
            state_code: Some("nj".to_string()),
        };
        let bonus = service
            .grant_bonus(&alice(), PlatformId::Fanduel, grant, NOW)
            .await
            .unwrap();
        assert_eq!(bonus.amount, Decimal::from_units(30));

        let grant = BonusGrant {
            amount: Decimal::from_units(20),
            expires: None,
            state_code: Some("NV".to_string()),
        };
        let err = service
            .grant_bonus(&alice(), PlatformId::Fanduel, grant, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::BonusNotPermitted(s) if s == "NV"));
    }

    #[tokio::test]
    async fn test_consume_bonus_spends_soonest_expiry_first() {
        let (service, _dir) = service().await;
        service.initialize_user_wallet(&alice(), NOW).await.unwrap();

        for (units, days) in [(10, 10), (5, 2)] {
            let grant = BonusGrant {
                amount: Decimal::from_units(units),
                expires: Some(NOW.plus_ms(days * MS_PER_DAY)),
                state_code: None,
            };
            service
                .grant_bonus(&alice(), PlatformId::Draftkings, grant, NOW)
                .await
                .unwrap();
        }

        let sub = service
            .consume_bonus(&alice(), PlatformId::Draftkings, Decimal::from_units(7), NOW)
            .await
            .unwrap();
        assert_eq!(sub.total_bonus_balance(NOW), Decimal::from_units(8));
        let used = sub
            .bonus_balances
            .iter()
            .filter(|b| b.status == BonusStatus::Used)
            .count();
        assert_eq!(used, 1);

        let err = service
            .consume_bonus(&alice(), PlatformId::Draftkings, Decimal::from_units(9), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBonus { .. }));
    }

    #[tokio::test]
    async fn test_sweep_expires_and_bumps_version() {
        let (service, _dir) = service().await;
        service.initialize_user_wallet(&alice(), NOW).await.unwrap();
        let grant = BonusGrant {
            amount: Decimal::from_units(20),
            expires: Some(NOW.plus_ms(MS_PER_DAY)),
            state_code: None,
        };
        service
            .grant_bonus(&alice(), PlatformId::Fanduel, grant, NOW)
            .await
            .unwrap();
        let before = service.get_wallet(&alice()).await.unwrap();

        let later = NOW.plus_ms(2 * MS_PER_DAY);
        assert_eq!(service.sweep_expired_bonuses(later).await.unwrap(), 1);
        assert_eq!(service.sweep_expired_bonuses(later).await.unwrap(), 0);

        let changes = service.changes_since(&alice(), before.version).await.unwrap();
        assert_eq!(changes.sub_wallets.len(), 1);
        assert_eq!(
            changes.sub_wallets[0].bonus_balances[0].status,
            BonusStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_deposit_bankroll() {
        let (service, _dir) = service().await;
        service.initialize_user_wallet(&alice(), NOW).await.unwrap();
        let wallet = service
            .deposit_bankroll(&alice(), Decimal::from_scaled(10_050, 2), Some("ach-1"), NOW)
            .await
            .unwrap();
        assert_eq!(wallet.bankroll_balance, Decimal::from_scaled(10_050, 2));
        assert_eq!(wallet.available_withdrawal(), Decimal::from_scaled(10_050, 2));

        let err = service
            .deposit_bankroll(&UserId::new("ghost".to_string()), Decimal::one(), None, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::WalletNotFound(_)));
    }
}
