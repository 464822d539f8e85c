//! Expense share computation for group wallets.

use crate::domain::{Decimal, ExpenseSplit, UserId};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("expense amount must be positive with at most two decimals")]
    InvalidAmount,
    #[error("split has no participants")]
    NoParticipants,
    #[error("participant {0} listed twice")]
    DuplicateParticipant(UserId),
    #[error("share for {0} must not be negative")]
    NegativeShare(UserId),
    #[error("shares add up to {actual}, expected {expected}")]
    SharesMismatch { expected: Decimal, actual: Decimal },
}

/// Resolve a split into one share per participant. Shares always sum to
/// `amount`.
pub fn compute_shares(
    amount: Decimal,
    split: &ExpenseSplit,
) -> Result<BTreeMap<UserId, Decimal>, SplitError> {
    if !amount.is_positive() || !amount.has_cent_precision() {
        return Err(SplitError::InvalidAmount);
    }

    match split {
        ExpenseSplit::Equal { participants } => {
            if participants.is_empty() {
                return Err(SplitError::NoParticipants);
            }
            let mut shares = BTreeMap::new();
            let count = participants.len() as i64;
            let base =
                Decimal::new(amount.inner() / rust_decimal::Decimal::from(count)).floor_cents();
            let mut leftover = amount - base * Decimal::from_units(count);
            let cent = Decimal::from_scaled(1, 2);

            for user in participants {
                let mut share = base;
                if leftover.is_positive() {
                    share += cent;
                    leftover -= cent;
                }
                if shares.insert(user.clone(), share).is_some() {
                    return Err(SplitError::DuplicateParticipant(user.clone()));
                }
            }
            Ok(shares)
        }
        ExpenseSplit::Exact { shares } => {
            if shares.is_empty() {
                return Err(SplitError::NoParticipants);
            }
            if let Some((user, _)) = shares.iter().find(|(_, s)| s.is_negative()) {
                return Err(SplitError::NegativeShare(user.clone()));
            }
            let actual: Decimal = shares.values().sum();
            if actual != amount {
                return Err(SplitError::SharesMismatch {
                    expected: amount,
                    actual,
                });
            }
            Ok(shares.clone())
        }
    }
}
