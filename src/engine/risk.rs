//! Rule-table risk score for P2P transfers.

use crate::domain::Decimal;

/// Additive score in [0, 1]:
/// - amount > 1000: +0.2, amount > 5000: +0.3 more
/// - first transfer to this recipient: +0.2
/// - sender account younger than 7 days: +0.3, else younger than 30 days: +0.1
pub fn calculate_risk_score(
    amount: Decimal,
    first_time_recipient: bool,
    account_age_days: i64,
) -> Decimal {
    let mut score = Decimal::zero();

    if amount > Decimal::from_units(1_000) {
        score += Decimal::from_scaled(2, 1);
    }
    if amount > Decimal::from_units(5_000) {
        score += Decimal::from_scaled(3, 1);
    }
    if first_time_recipient {
        score += Decimal::from_scaled(2, 1);
    }
    if account_age_days < 7 {
        score += Decimal::from_scaled(3, 1);
    } else if account_age_days < 30 {
        score += Decimal::from_scaled(1, 1);
    }

    score.min(Decimal::one())
}
