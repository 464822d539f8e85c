//! Transfer spend limits over calendar windows (UTC day, ISO week, month).
//!
//! Counters carry the start of the window they were accumulated in; a counter
//! from an earlier window counts as zero.

use crate::domain::{Decimal, SpendWindow, TimeMs, UserLimits};
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    PerTransaction,
    Daily,
    Weekly,
    Monthly,
}

impl LimitKind {
    pub fn label(&self) -> &'static str {
        match self {
            LimitKind::PerTransaction => "per-transaction limit",
            LimitKind::Daily => "daily limit",
            LimitKind::Weekly => "weekly limit",
            LimitKind::Monthly => "monthly limit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitViolation {
    pub kind: LimitKind,
    pub limit: Decimal,
    /// What is still allowed in the window (the limit itself for per-transaction).
    pub remaining: Decimal,
    pub requested: Decimal,
}

impl fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "amount {} exceeds {} of {} (remaining {})",
            self.requested,
            self.kind.label(),
            self.limit,
            self.remaining
        )
    }
}

impl std::error::Error for LimitViolation {}

/// Start of the UTC day, ISO week and month containing `now`.
pub fn window_starts(now: TimeMs) -> (TimeMs, TimeMs, TimeMs) {
    let date = now.to_datetime().date_naive();
    let week_start = date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64);
    let month_start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
    (
        midnight_ms(date),
        midnight_ms(week_start),
        midnight_ms(month_start),
    )
}

fn midnight_ms(date: NaiveDate) -> TimeMs {
    let ms = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp_millis())
        .unwrap_or(0);
    TimeMs::new(ms)
}

fn spent_in(window: &SpendWindow, current_start: TimeMs) -> Decimal {
    if window.window_start >= current_start {
        window.spent
    } else {
        Decimal::zero()
    }
}

/// Daily, weekly and monthly spend that still counts at `now`.
pub fn current_spend(limits: &UserLimits, now: TimeMs) -> (Decimal, Decimal, Decimal) {
    let (day, week, month) = window_starts(now);
    (
        spent_in(&limits.daily, day),
        spent_in(&limits.weekly, week),
        spent_in(&limits.monthly, month),
    )
}

/// Reject `amount` if it breaks the per-transaction limit or would push any
/// window's spend over its limit. Each limit is checked independently.
pub fn check_transfer_limits(
    limits: &UserLimits,
    amount: Decimal,
    now: TimeMs,
) -> Result<(), LimitViolation> {
    if amount > limits.per_transaction_limit {
        return Err(LimitViolation {
            kind: LimitKind::PerTransaction,
            limit: limits.per_transaction_limit,
            remaining: limits.per_transaction_limit,
            requested: amount,
        });
    }

    let (day, week, month) = window_starts(now);
    let windows = [
        (LimitKind::Daily, limits.daily_limit, &limits.daily, day),
        (LimitKind::Weekly, limits.weekly_limit, &limits.weekly, week),
        (LimitKind::Monthly, limits.monthly_limit, &limits.monthly, month),
    ];

    for (kind, limit, window, start) in windows {
        let spent = spent_in(window, start);
        if spent + amount > limit {
            return Err(LimitViolation {
                kind,
                limit,
                remaining: (limit - spent).max(Decimal::zero()),
                requested: amount,
            });
        }
    }

    Ok(())
}

/// Counters after spending `amount` at `now`, rolling expired windows.
pub fn record_spend(limits: &UserLimits, amount: Decimal, now: TimeMs) -> UserLimits {
    let (day, week, month) = window_starts(now);
    let roll = |window: &SpendWindow, start: TimeMs| SpendWindow {
        spent: spent_in(window, start) + amount,
        window_start: start,
    };

    UserLimits {
        daily: roll(&limits.daily, day),
        weekly: roll(&limits.weekly, week),
        monthly: roll(&limits.monthly, month),
        ..limits.clone()
    }
}

/// Limits must be positive and nest: per-transaction <= daily <= weekly <= monthly.
pub fn validate_limits(limits: &UserLimits) -> Result<(), String> {
    let all = [
        ("perTransactionLimit", limits.per_transaction_limit),
        ("dailyLimit", limits.daily_limit),
        ("weeklyLimit", limits.weekly_limit),
        ("monthlyLimit", limits.monthly_limit),
    ];
    if let Some((name, _)) = all.iter().find(|(_, v)| !v.is_positive()) {
        return Err(format!("{} must be greater than 0", name));
    }
    if limits.per_transaction_limit > limits.daily_limit
        || limits.daily_limit > limits.weekly_limit
        || limits.weekly_limit > limits.monthly_limit
    {
        return Err(
            "limits must satisfy perTransaction <= daily <= weekly <= monthly".to_string(),
        );
    }
    Ok(())
}
