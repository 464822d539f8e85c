//! Shared group wallets: members track what the group owes them.

use crate::db::repo::{groups, insert_user_if_absent, new_id, wallets};
use crate::db::Repository;
use crate::domain::{Decimal, Expense, ExpenseSplit, GroupWallet, TimeMs, UserId, WalletTxKind};
use crate::engine::{compute_shares, SplitError};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const MAX_NAME_CHARS: usize = 80;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("{0}")]
    Invalid(String),
    #[error("group {0} not found")]
    NotFound(String),
    #[error("{0} is not a member of this group")]
    NotMember(UserId),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<Repository>,
}

impl GroupService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn create_group(
        &self,
        name: &str,
        members: &[UserId],
        now: TimeMs,
    ) -> Result<GroupWallet, GroupError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
            return Err(GroupError::Invalid(format!(
                "name must be 1 to {} characters",
                MAX_NAME_CHARS
            )));
        }
        let unique: BTreeSet<&UserId> = members.iter().collect();
        if unique.len() < 2 {
            return Err(GroupError::Invalid(
                "a group needs at least two distinct members".to_string(),
            ));
        }

        let id = new_id();
        let mut tx = self.repo.begin().await?;
        groups::insert_group(&mut tx, &id, name, now).await?;
        for member in &unique {
            insert_user_if_absent(&mut tx, member, now).await?;
            groups::insert_member(&mut tx, &id, member).await?;
        }
        let group = groups::load_group(&mut tx, &id)
            .await?
            .ok_or_else(|| GroupError::NotFound(id.clone()))?;
        tx.commit().await?;

        info!(group_id = %id, members = unique.len(), "Created group");
        Ok(group)
    }

    pub async fn get_group(&self, id: &str) -> Result<GroupWallet, GroupError> {
        self.repo
            .get_group(id)
            .await?
            .ok_or_else(|| GroupError::NotFound(id.to_string()))
    }

    /// Record an expense: the payer is credited the full amount and each
    /// participant is debited their share, so balances keep summing to zero.
    pub async fn add_expense(
        &self,
        group_id: &str,
        paid_by: &UserId,
        amount: Decimal,
        description: &str,
        split: &ExpenseSplit,
        now: TimeMs,
    ) -> Result<GroupWallet, GroupError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(GroupError::Invalid("description is required".to_string()));
        }
        let shares = compute_shares(amount, split)?;

        let mut tx = self.repo.begin().await?;
        // Write first so the balance reads below happen under the write lock.
        if !groups::touch_group(&mut tx, group_id).await? {
            return Err(GroupError::NotFound(group_id.to_string()));
        }

        let mut balances = groups::member_balances(&mut tx, group_id).await?;
        for user in std::iter::once(paid_by).chain(shares.keys()) {
            if !balances.contains_key(user) {
                return Err(GroupError::NotMember(user.clone()));
            }
        }

        if let Some(balance) = balances.get_mut(paid_by) {
            *balance += amount;
        }
        for (user, share) in &shares {
            if let Some(balance) = balances.get_mut(user) {
                *balance -= *share;
            }
        }
        for (user, balance) in &balances {
            groups::set_member_balance(&mut tx, group_id, user, *balance).await?;
        }
        let expense = Expense {
            id: new_id(),
            paid_by: paid_by.clone(),
            amount,
            description: description.to_string(),
            shares,
            created_ms: now,
        };
        groups::insert_expense(&mut tx, group_id, &expense).await?;
        wallets::insert_wallet_tx(
            &mut tx,
            paid_by,
            None,
            WalletTxKind::GroupExpense,
            amount,
            Some(&expense.id),
            now,
        )
        .await?;

        let group = groups::load_group(&mut tx, group_id)
            .await?
            .ok_or_else(|| GroupError::NotFound(group_id.to_string()))?;
        tx.commit().await?;

        info!(group_id = %group_id, expense_id = %expense.id, amount = %amount, "Recorded expense");
        Ok(group)
    }
}
