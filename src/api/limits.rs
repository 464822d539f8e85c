use super::{parse_user, AppState};
use crate::domain::{Decimal, TimeMs, UserLimits};
use crate::engine::current_spend;
use crate::error::AppError;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsResponse {
    pub per_transaction_limit: Decimal,
    pub daily_limit: Decimal,
    pub weekly_limit: Decimal,
    pub monthly_limit: Decimal,
    /// Spend in the current UTC day, week and month.
    pub daily_spent: Decimal,
    pub weekly_spent: Decimal,
    pub monthly_spent: Decimal,
}

impl LimitsResponse {
    fn new(limits: &UserLimits, now: TimeMs) -> Self {
        let (daily_spent, weekly_spent, monthly_spent) = current_spend(limits, now);
        Self {
            per_transaction_limit: limits.per_transaction_limit,
            daily_limit: limits.daily_limit,
            weekly_limit: limits.weekly_limit,
            monthly_limit: limits.monthly_limit,
            daily_spent,
            weekly_spent,
            monthly_spent,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLimitsBody {
    pub per_transaction_limit: Decimal,
    pub daily_limit: Decimal,
    pub weekly_limit: Decimal,
    pub monthly_limit: Decimal,
}

pub async fn get_limits(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LimitsResponse>, AppError> {
    let user = parse_user(&user)?;
    let limits = state.transfers.get_limits(&user).await?;
    Ok(Json(LimitsResponse::new(&limits, TimeMs::now())))
}

pub async fn update_limits(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<UpdateLimitsBody>,
) -> Result<Json<LimitsResponse>, AppError> {
    let user = parse_user(&user)?;
    let now = TimeMs::now();
    let requested = UserLimits {
        per_transaction_limit: body.per_transaction_limit,
        daily_limit: body.daily_limit,
        weekly_limit: body.weekly_limit,
        monthly_limit: body.monthly_limit,
        ..UserLimits::default()
    };
    let stored = state.transfers.update_limits(&user, &requested, now).await?;
    Ok(Json(LimitsResponse::new(&stored, now)))
}
