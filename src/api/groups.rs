use super::{parse_user, AppState};
use crate::domain::{Decimal, ExpenseSplit, GroupWallet, TimeMs};
use crate::error::AppError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
    pub name: String,
    pub members: Vec<String>,
}

pub async fn create_group(
    State(state): State<AppState>,
    Json(body): Json<CreateGroupBody>,
) -> Result<(StatusCode, Json<GroupWallet>), AppError> {
    let members = body
        .members
        .iter()
        .map(|m| parse_user(m))
        .collect::<Result<Vec<_>, _>>()?;
    let group = state
        .groups
        .create_group(&body.name, &members, TimeMs::now())
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GroupWallet>, AppError> {
    Ok(Json(state.groups.get_group(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddExpenseBody {
    pub paid_by: String,
    pub amount: Decimal,
    pub description: String,
    pub split: ExpenseSplit,
}

pub async fn add_expense(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<AddExpenseBody>,
) -> Result<(StatusCode, Json<GroupWallet>), AppError> {
    let paid_by = parse_user(&body.paid_by)?;
    let group = state
        .groups
        .add_expense(
            &id,
            &paid_by,
            body.amount,
            &body.description,
            &body.split,
            TimeMs::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}
