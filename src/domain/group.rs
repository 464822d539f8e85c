//! Shared group wallets with expense splitting.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupWallet {
    pub id: String,
    pub name: String,
    pub created_ms: TimeMs,
    /// Net position per member: positive means the group owes the member.
    pub member_balances: BTreeMap<UserId, Decimal>,
    pub expenses: Vec<Expense>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub paid_by: UserId,
    pub amount: Decimal,
    pub description: String,
    pub shares: BTreeMap<UserId, Decimal>,
    pub created_ms: TimeMs,
}

/// How an expense is divided among members.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ExpenseSplit {
    /// Equal shares; leftover cents go to the first participants listed.
    Equal { participants: Vec<UserId> },
    /// Explicit shares that must add up to the expense amount.
    Exact { shares: BTreeMap<UserId, Decimal> },
}
