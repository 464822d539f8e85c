//! Multi-platform wallet model: one main wallet per user, one sub-wallet per
//! partner platform, each sub-wallet holding cash plus expiring bonuses.

use crate::domain::{Decimal, PlatformId, TimeMs, UserId};
use crate::engine::bonus::active_bonus_total;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BonusStatus {
    Active,
    Expired,
    Used,
}

impl BonusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusStatus::Active => "active",
            BonusStatus::Expired => "expired",
            BonusStatus::Used => "used",
        }
    }
}

impl FromStr for BonusStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BonusStatus::Active),
            "expired" => Ok(BonusStatus::Expired),
            "used" => Ok(BonusStatus::Used),
            other => Err(format!("unknown bonus status: {}", other)),
        }
    }
}

/// A platform-restricted, non-withdrawable credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusBalance {
    pub id: String,
    /// Remaining amount.
    pub amount: Decimal,
    pub initial_amount: Decimal,
    pub date_granted: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_expires: Option<TimeMs>,
    pub status: BonusStatus,
}

impl BonusBalance {
    pub fn is_expired_at(&self, now: TimeMs) -> bool {
        matches!(self.date_expires, Some(expires) if expires <= now)
    }

    /// Status as observed at `now`: an `active` bonus past its expiry reads as
    /// `expired` even before the sweeper has rewritten it.
    pub fn effective_status(&self, now: TimeMs) -> BonusStatus {
        match self.status {
            BonusStatus::Active if self.is_expired_at(now) => BonusStatus::Expired,
            other => other,
        }
    }

    /// Counts toward the spendable bonus total.
    pub fn is_spendable_at(&self, now: TimeMs) -> bool {
        self.effective_status(now) == BonusStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubWalletStatus {
    Active,
    Suspended,
    Closed,
}

impl SubWalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubWalletStatus::Active => "active",
            SubWalletStatus::Suspended => "suspended",
            SubWalletStatus::Closed => "closed",
        }
    }
}

impl FromStr for SubWalletStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubWalletStatus::Active),
            "suspended" => Ok(SubWalletStatus::Suspended),
            "closed" => Ok(SubWalletStatus::Closed),
            other => Err(format!("unknown sub-wallet status: {}", other)),
        }
    }
}

/// Per-platform balance record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubWallet {
    pub user: UserId,
    pub platform: PlatformId,
    pub cash_balance: Decimal,
    pub bonus_balances: Vec<BonusBalance>,
    pub connected: bool,
    pub created: TimeMs,
    pub status: SubWalletStatus,
    /// Wallet version at which this sub-wallet last changed.
    pub version: i64,
}

impl SubWallet {
    pub fn total_bonus_balance(&self, now: TimeMs) -> Decimal {
        active_bonus_total(&self.bonus_balances, now)
    }
}

/// Aggregate view of a user's balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainWallet {
    pub user: UserId,
    pub bankroll_balance: Decimal,
    pub version: i64,
    pub created: TimeMs,
    pub sub_wallets: BTreeMap<PlatformId, SubWallet>,
}

impl MainWallet {
    pub fn total_cash_balance(&self) -> Decimal {
        self.sub_wallets.values().map(|w| w.cash_balance).sum()
    }

    pub fn total_bonus_balance(&self, now: TimeMs) -> Decimal {
        self.sub_wallets
            .values()
            .map(|w| w.total_bonus_balance(now))
            .sum()
    }

    /// Bonuses are never withdrawable.
    pub fn available_withdrawal(&self) -> Decimal {
        self.total_cash_balance() + self.bankroll_balance
    }
}

/// Kinds of entries in the `wallet_transactions` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletTxKind {
    CashAdjustment,
    BonusGrant,
    BonusConsume,
    BankrollDeposit,
    TransferOut,
    TransferIn,
    GroupExpense,
}

impl WalletTxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTxKind::CashAdjustment => "cash_adjustment",
            WalletTxKind::BonusGrant => "bonus_grant",
            WalletTxKind::BonusConsume => "bonus_consume",
            WalletTxKind::BankrollDeposit => "bankroll_deposit",
            WalletTxKind::TransferOut => "transfer_out",
            WalletTxKind::TransferIn => "transfer_in",
            WalletTxKind::GroupExpense => "group_expense",
        }
    }
}
