use crate::config::ConfigError;
use crate::orchestration::{
    GroupError, LocationError, PaymentRequestError, TransferError, WalletError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Well-formed request rejected by a business rule (funds, limits).
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        let msg = err.to_string();
        match err {
            WalletError::WalletNotFound(_) | WalletError::SubWalletNotFound { .. } => {
                AppError::NotFound(msg)
            }
            WalletError::Invalid(_) => AppError::BadRequest(msg),
            WalletError::SubWalletInactive(_) | WalletError::VersionConflict { .. } => {
                AppError::Conflict(msg)
            }
            WalletError::InsufficientFunds { .. }
            | WalletError::InsufficientBonus { .. }
            | WalletError::BonusNotPermitted(_) => AppError::Unprocessable(msg),
            WalletError::Db(_) => AppError::Internal(msg),
        }
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        let msg = err.to_string();
        match err {
            TransferError::Invalid(_) | TransferError::SelfTransfer => AppError::BadRequest(msg),
            TransferError::WalletNotFound(_) | TransferError::NotFound(_) => {
                AppError::NotFound(msg)
            }
            TransferError::VerificationRequired(_) | TransferError::NotSender => {
                AppError::Forbidden(msg)
            }
            TransferError::Limit(_) | TransferError::InsufficientFunds { .. } => {
                AppError::Unprocessable(msg)
            }
            TransferError::InvalidState { .. } | TransferError::RequestClosed(_) => {
                AppError::Conflict(msg)
            }
            TransferError::Db(_) => AppError::Internal(msg),
        }
    }
}

impl From<PaymentRequestError> for AppError {
    fn from(err: PaymentRequestError) -> Self {
        let msg = err.to_string();
        match err {
            PaymentRequestError::Invalid(_) => AppError::BadRequest(msg),
            PaymentRequestError::NotFound(_) => AppError::NotFound(msg),
            PaymentRequestError::Forbidden(_) => AppError::Forbidden(msg),
            PaymentRequestError::NotPending { .. } => AppError::Conflict(msg),
            PaymentRequestError::Transfer(e) => e.into(),
            PaymentRequestError::Db(_) => AppError::Internal(msg),
        }
    }
}

impl From<GroupError> for AppError {
    fn from(err: GroupError) -> Self {
        let msg = err.to_string();
        match err {
            GroupError::Invalid(_) | GroupError::Split(_) => AppError::BadRequest(msg),
            GroupError::NotFound(_) => AppError::NotFound(msg),
            GroupError::NotMember(_) => AppError::Unprocessable(msg),
            GroupError::Db(_) => AppError::Internal(msg),
        }
    }
}

impl From<LocationError> for AppError {
    fn from(err: LocationError) -> Self {
        let msg = err.to_string();
        match err {
            LocationError::Invalid(_) => AppError::BadRequest(msg),
            LocationError::Unresolved(_) => AppError::Unavailable(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, TransferStatus};
    use crate::engine::{LimitKind, LimitViolation};

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_transfer_error_statuses() {
        let limit = TransferError::Limit(LimitViolation {
            kind: LimitKind::Daily,
            limit: Decimal::from_units(2_500),
            remaining: Decimal::from_units(100),
            requested: Decimal::from_units(200),
        });
        assert_eq!(status_of(limit.into()), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_of(TransferError::VerificationRequired(vec!["pin"]).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(
                TransferError::InvalidState {
                    id: "t1".to_string(),
                    status: TransferStatus::Completed
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(TransferError::SelfTransfer.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_payment_request_unwraps_transfer_error() {
        let err = PaymentRequestError::Transfer(TransferError::NotFound("t1".to_string()));
        assert_eq!(status_of(err.into()), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_location_unresolved_is_unavailable() {
        let err = LocationError::Unresolved(vec!["ip: down".to_string()]);
        assert_eq!(status_of(err.into()), StatusCode::SERVICE_UNAVAILABLE);
    }
}
