//! P2P transfer endpoints.

use super::{parse_amount, parse_user, ActorBody, AppState};
use crate::domain::{Decimal, P2PTransfer, TimeMs, VerificationProof};
use crate::error::AppError;
use crate::orchestration::{TransferPreview, TransferRequest};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferBody {
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: Decimal,
    pub note: Option<String>,
    #[serde(default)]
    pub verification: VerificationProof,
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Json(body): Json<CreateTransferBody>,
) -> Result<(StatusCode, Json<P2PTransfer>), AppError> {
    let request = TransferRequest {
        sender_id: parse_user(&body.sender_id)?,
        receiver_id: parse_user(&body.receiver_id)?,
        amount: body.amount,
        note: body.note,
        verification: body.verification,
    };
    let transfer = state
        .transfers
        .initiate_transfer(request, TimeMs::now())
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

#[derive(Debug, Deserialize)]
pub struct TransfersQuery {
    pub user: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TransfersResponse {
    pub transfers: Vec<P2PTransfer>,
}

pub async fn list_transfers(
    Query(params): Query<TransfersQuery>,
    State(state): State<AppState>,
) -> Result<Json<TransfersResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let transfers = state.transfers.list_transfers(&user, params.limit).await?;
    Ok(Json(TransfersResponse { transfers }))
}

pub async fn get_transfer(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<P2PTransfer>, AppError> {
    Ok(Json(state.transfers.get_transfer(&id).await?))
}

pub async fn cancel_transfer(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<ActorBody>,
) -> Result<Json<P2PTransfer>, AppError> {
    let user = parse_user(&body.user)?;
    let transfer = state
        .transfers
        .cancel_transfer(&id, &user, TimeMs::now())
        .await?;
    Ok(Json(transfer))
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub sender: String,
    pub receiver: String,
    pub amount: String,
}

pub async fn preview_transfer(
    Query(params): Query<PreviewQuery>,
    State(state): State<AppState>,
) -> Result<Json<TransferPreview>, AppError> {
    let sender = parse_user(&params.sender)?;
    let receiver = parse_user(&params.receiver)?;
    let amount = parse_amount("amount", &params.amount)?;
    let preview = state
        .transfers
        .preview(&sender, &receiver, amount, TimeMs::now())
        .await?;
    Ok(Json(preview))
}
