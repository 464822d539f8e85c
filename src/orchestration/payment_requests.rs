//! Requests for money that the payer settles with a P2P transfer.

use crate::db::repo::transfers;
use crate::db::Repository;
use crate::domain::{
    Decimal, NewNotification, PaymentRequest, PaymentRequestStatus, TimeMs, UserId,
    VerificationProof,
};
use crate::orchestration::notifications::NotificationService;
use crate::orchestration::transfers::{TransferError, TransferRequest, TransferService};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PaymentRequestError {
    #[error("{0}")]
    Invalid(String),
    #[error("payment request {0} not found")]
    NotFound(String),
    #[error("only the {0} can do that")]
    Forbidden(&'static str),
    #[error("payment request {id} is {}", .status.as_str())]
    NotPending {
        id: String,
        status: PaymentRequestStatus,
    },
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct PaymentRequestService {
    repo: Arc<Repository>,
    transfers: TransferService,
    notifications: NotificationService,
}

impl PaymentRequestService {
    pub fn new(
        repo: Arc<Repository>,
        transfers: TransferService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            repo,
            transfers,
            notifications,
        }
    }

    pub async fn create_request(
        &self,
        requester: &UserId,
        payer: &UserId,
        amount: Decimal,
        note: Option<String>,
        now: TimeMs,
    ) -> Result<PaymentRequest, PaymentRequestError> {
        if !amount.is_positive() || !amount.has_cent_precision() {
            return Err(PaymentRequestError::Invalid(
                "amount must be positive with at most two decimals".to_string(),
            ));
        }
        if requester == payer {
            return Err(PaymentRequestError::Invalid(
                "cannot request money from yourself".to_string(),
            ));
        }
        for user in [requester, payer] {
            if self.repo.get_user_created(user).await?.is_none() {
                return Err(TransferError::WalletNotFound(user.clone()).into());
            }
        }

        let request = PaymentRequest {
            id: uuid::Uuid::new_v4().to_string(),
            requester_id: requester.clone(),
            payer_id: payer.clone(),
            amount,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            status: PaymentRequestStatus::Pending,
            transfer_id: None,
            created_ms: now,
            updated_ms: now,
        };
        let mut conn = self.repo.pool().acquire().await?;
        transfers::insert_payment_request(&mut conn, &request).await?;
        drop(conn);

        info!(
            request_id = %request.id,
            requester = %requester,
            payer = %payer,
            "Payment requested"
        );
        self.notifications
            .enqueue_best_effort(
                NewNotification {
                    user_id: payer.clone(),
                    title: "Payment request".to_string(),
                    body: format!("{} requested ${:.2}", requester, amount.inner()),
                    icon: None,
                    action: Some(format!("/requests/{}", request.id)),
                    tag: format!("request-{}", request.id),
                },
                now,
            )
            .await;
        Ok(request)
    }

    pub async fn list_requests(
        &self,
        user: &UserId,
    ) -> Result<Vec<PaymentRequest>, PaymentRequestError> {
        Ok(self.repo.list_payment_requests_for_user(user).await?)
    }

    /// Pay a pending request with a transfer from the payer to the requester.
    /// The request flips to `paid` in the transaction that moves the funds, so
    /// concurrent payments, declines and cancels settle it at most once.
    pub async fn pay(
        &self,
        id: &str,
        payer: &UserId,
        verification: VerificationProof,
        now: TimeMs,
    ) -> Result<PaymentRequest, PaymentRequestError> {
        let request = self.pending_request(id).await?;
        if &request.payer_id != payer {
            return Err(PaymentRequestError::Forbidden("payer"));
        }

        let paid = self
            .transfers
            .initiate_request_payment(
                TransferRequest {
                    sender_id: request.payer_id.clone(),
                    receiver_id: request.requester_id.clone(),
                    amount: request.amount,
                    note: request.note.clone(),
                    verification,
                },
                &request.id,
                now,
            )
            .await;
        let transfer = match paid {
            Ok(transfer) => transfer,
            Err(TransferError::RequestClosed(_)) => {
                let current = self.repo.get_payment_request(id).await?;
                return Err(PaymentRequestError::NotPending {
                    id: id.to_string(),
                    status: current.map(|r| r.status).unwrap_or(request.status),
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(request_id = %id, transfer_id = %transfer.id, "Payment request paid");
        self.repo
            .get_payment_request(id)
            .await?
            .ok_or_else(|| PaymentRequestError::NotFound(id.to_string()))
    }

    pub async fn decline(
        &self,
        id: &str,
        payer: &UserId,
        now: TimeMs,
    ) -> Result<PaymentRequest, PaymentRequestError> {
        let request = self.pending_request(id).await?;
        if &request.payer_id != payer {
            return Err(PaymentRequestError::Forbidden("payer"));
        }
        self.resolve(&request, PaymentRequestStatus::Declined, now)
            .await
    }

    pub async fn cancel(
        &self,
        id: &str,
        requester: &UserId,
        now: TimeMs,
    ) -> Result<PaymentRequest, PaymentRequestError> {
        let request = self.pending_request(id).await?;
        if &request.requester_id != requester {
            return Err(PaymentRequestError::Forbidden("requester"));
        }
        self.resolve(&request, PaymentRequestStatus::Cancelled, now)
            .await
    }

    async fn pending_request(&self, id: &str) -> Result<PaymentRequest, PaymentRequestError> {
        let request = self
            .repo
            .get_payment_request(id)
            .await?
            .ok_or_else(|| PaymentRequestError::NotFound(id.to_string()))?;
        if request.status != PaymentRequestStatus::Pending {
            return Err(PaymentRequestError::NotPending {
                id: id.to_string(),
                status: request.status,
            });
        }
        Ok(request)
    }

    async fn resolve(
        &self,
        request: &PaymentRequest,
        status: PaymentRequestStatus,
        now: TimeMs,
    ) -> Result<PaymentRequest, PaymentRequestError> {
        let mut conn = self.repo.pool().acquire().await?;
        if !transfers::resolve_payment_request(&mut conn, &request.id, status, None, now).await? {
            let current = transfers::get_payment_request(&mut conn, &request.id)
                .await?
                .map(|r| r.status)
                .unwrap_or(status);
            return Err(PaymentRequestError::NotPending {
                id: request.id.clone(),
                status: current,
            });
        }
        let updated = transfers::get_payment_request(&mut conn, &request.id)
            .await?
            .ok_or_else(|| PaymentRequestError::NotFound(request.id.clone()))?;
        info!(request_id = %request.id, status = status.as_str(), "Payment request resolved");
        Ok(updated)
    }
}
