use super::{parse_user, AppState};
use crate::domain::{Notification, TimeMs};
use crate::error::AppError;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub notifications: Vec<Notification>,
}

/// Each notification is returned once; fetching marks it delivered.
pub async fn get_pending(
    Query(params): Query<PendingQuery>,
    State(state): State<AppState>,
) -> Result<Json<PendingResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let notifications = state.notifications.pending(&user, TimeMs::now()).await?;
    Ok(Json(PendingResponse { notifications }))
}

#[derive(Debug, Deserialize)]
pub struct DismissBody {
    pub user: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DismissResponse {
    pub dismissed: bool,
}

pub async fn dismiss(
    State(state): State<AppState>,
    Json(body): Json<DismissBody>,
) -> Result<Json<DismissResponse>, AppError> {
    let user = parse_user(&body.user)?;
    if !state
        .notifications
        .dismiss(&user, &body.id, TimeMs::now())
        .await?
    {
        return Err(AppError::NotFound(format!("notification {}", body.id)));
    }
    Ok(Json(DismissResponse { dismissed: true }))
}
