use super::{parse_user, ActorBody, AppState};
use crate::domain::{Decimal, PaymentRequest, TimeMs, VerificationProof};
use crate::error::AppError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    pub requester_id: String,
    pub payer_id: String,
    pub amount: Decimal,
    pub note: Option<String>,
}

pub async fn create_request(
    State(state): State<AppState>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<PaymentRequest>), AppError> {
    let requester = parse_user(&body.requester_id)?;
    let payer = parse_user(&body.payer_id)?;
    let request = state
        .payment_requests
        .create_request(&requester, &payer, body.amount, body.note, TimeMs::now())
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Debug, Deserialize)]
pub struct RequestsQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct RequestsResponse {
    pub requests: Vec<PaymentRequest>,
}

pub async fn list_requests(
    Query(params): Query<RequestsQuery>,
    State(state): State<AppState>,
) -> Result<Json<RequestsResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let requests = state.payment_requests.list_requests(&user).await?;
    Ok(Json(RequestsResponse { requests }))
}

#[derive(Debug, Deserialize)]
pub struct PayBody {
    pub user: String,
    #[serde(default)]
    pub verification: VerificationProof,
}

pub async fn pay_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<PayBody>,
) -> Result<Json<PaymentRequest>, AppError> {
    let payer = parse_user(&body.user)?;
    let request = state
        .payment_requests
        .pay(&id, &payer, body.verification, TimeMs::now())
        .await?;
    Ok(Json(request))
}

pub async fn decline_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<ActorBody>,
) -> Result<Json<PaymentRequest>, AppError> {
    let payer = parse_user(&body.user)?;
    let request = state
        .payment_requests
        .decline(&id, &payer, TimeMs::now())
        .await?;
    Ok(Json(request))
}

pub async fn cancel_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<ActorBody>,
) -> Result<Json<PaymentRequest>, AppError> {
    let requester = parse_user(&body.user)?;
    let request = state
        .payment_requests
        .cancel(&id, &requester, TimeMs::now())
        .await?;
    Ok(Json(request))
}
