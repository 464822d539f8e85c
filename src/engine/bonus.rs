//! Bonus balance arithmetic.
//!
//! `active_bonus_total` is the only place the spendable-bonus predicate lives;
//! sub-wallet views, main-wallet totals and the API all go through it.

use crate::domain::{BonusBalance, BonusStatus, Decimal, TimeMs};

/// Sum of bonus amounts that are `active` and not expired at `now`.
pub fn active_bonus_total(bonuses: &[BonusBalance], now: TimeMs) -> Decimal {
    bonuses
        .iter()
        .filter(|b| b.is_spendable_at(now))
        .map(|b| b.amount)
        .sum()
}

/// Result of drawing an amount down from a set of bonuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BonusDraw {
    /// (bonus id, new remaining amount, new status) for every touched bonus.
    pub updates: Vec<(String, Decimal, BonusStatus)>,
    pub consumed: Decimal,
}

/// Plan spending `amount` from spendable bonuses, soonest-expiring first
/// (bonuses without expiry last, ties by grant time).
///
/// Returns `None` when the spendable total is smaller than `amount`.
pub fn plan_bonus_draw(
    bonuses: &[BonusBalance],
    amount: Decimal,
    now: TimeMs,
) -> Option<BonusDraw> {
    if active_bonus_total(bonuses, now) < amount {
        return None;
    }

    let mut spendable: Vec<&BonusBalance> =
        bonuses.iter().filter(|b| b.is_spendable_at(now)).collect();
    spendable.sort_by_key(|b| {
        (
            b.date_expires.map(|t| t.as_ms()).unwrap_or(i64::MAX),
            b.date_granted.as_ms(),
        )
    });

    let mut remaining = amount;
    let mut updates = Vec::new();
    for bonus in spendable {
        if !remaining.is_positive() {
            break;
        }
        let take = bonus.amount.min(remaining);
        remaining -= take;
        let left = bonus.amount - take;
        let status = if left.is_zero() {
            BonusStatus::Used
        } else {
            BonusStatus::Active
        };
        updates.push((bonus.id.clone(), left, status));
    }

    Some(BonusDraw {
        updates,
        consumed: amount,
    })
}
