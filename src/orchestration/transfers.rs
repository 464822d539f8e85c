//! P2P transfers between users' bankroll balances.
//!
//! A transfer is recorded `pending`, moved to `processing`, then settled in a
//! single transaction that checks and records spend limits, checks the
//! sender's balance, moves the funds and flips the row to `completed`.
//! `initiate_transfer` returns only after settlement has committed or failed.

use crate::db::repo::{transfers, wallets};
use crate::db::Repository;
use crate::domain::{
    Decimal, NewNotification, P2PTransfer, PaymentRequestStatus, TimeMs, TransferStatus, UserId,
    UserLimits, VerificationProof, WalletTxKind,
};
use crate::engine::{
    calculate_risk_score, check_transfer_limits, get_required_verification, record_spend,
    validate_limits, LimitViolation, VerificationRequirements,
};
use crate::orchestration::notifications::NotificationService;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

const MAX_NOTE_CHARS: usize = 280;
const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{0}")]
    Invalid(String),
    #[error("cannot send money to yourself")]
    SelfTransfer,
    #[error("wallet not found for user {0}")]
    WalletNotFound(UserId),
    #[error("transfer {0} not found")]
    NotFound(String),
    #[error("verification required: {}", .0.join(", "))]
    VerificationRequired(Vec<&'static str>),
    #[error(transparent)]
    Limit(#[from] LimitViolation),
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("transfer {id} is {}", .status.as_str())]
    InvalidState { id: String, status: TransferStatus },
    #[error("only the sender can cancel a transfer")]
    NotSender,
    #[error("payment request {0} is no longer pending")]
    RequestClosed(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub amount: Decimal,
    pub note: Option<String>,
    pub verification: VerificationProof,
}

/// What a transfer would require, without moving any money.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPreview {
    pub amount: Decimal,
    pub risk_score: Decimal,
    pub first_time_recipient: bool,
    pub trusted_recipient: bool,
    pub verification: VerificationRequirements,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferPolicy {
    /// Completed transfers to a recipient before it counts as trusted.
    pub trusted_recipient_min_transfers: i64,
    /// Age after which open transfers are failed by startup recovery.
    pub stale_after_ms: i64,
}

#[derive(Clone)]
pub struct TransferService {
    repo: Arc<Repository>,
    notifications: NotificationService,
    policy: TransferPolicy,
}

impl TransferService {
    pub fn new(
        repo: Arc<Repository>,
        notifications: NotificationService,
        policy: TransferPolicy,
    ) -> Self {
        Self {
            repo,
            notifications,
            policy,
        }
    }

    pub async fn preview(
        &self,
        sender: &UserId,
        receiver: &UserId,
        amount: Decimal,
        now: TimeMs,
    ) -> Result<TransferPreview, TransferError> {
        if !amount.is_positive() || !amount.has_cent_precision() {
            return Err(TransferError::Invalid(
                "amount must be positive with at most two decimals".to_string(),
            ));
        }
        if sender == receiver {
            return Err(TransferError::SelfTransfer);
        }

        let (sender_created, receiver_created, completed) = futures::try_join!(
            self.repo.get_user_created(sender),
            self.repo.get_user_created(receiver),
            self.repo.count_completed_transfers(sender, receiver),
        )?;
        let sender_created =
            sender_created.ok_or_else(|| TransferError::WalletNotFound(sender.clone()))?;
        if receiver_created.is_none() {
            return Err(TransferError::WalletNotFound(receiver.clone()));
        }

        let first_time_recipient = completed == 0;
        let trusted_recipient = completed >= self.policy.trusted_recipient_min_transfers;

        Ok(TransferPreview {
            amount,
            risk_score: calculate_risk_score(
                amount,
                first_time_recipient,
                now.days_since(sender_created),
            ),
            first_time_recipient,
            trusted_recipient,
            verification: get_required_verification(amount, trusted_recipient),
        })
    }

    /// Validate, record and settle a transfer. Returns the completed transfer,
    /// or the error that failed it (the row is kept as `failed`).
    pub async fn initiate_transfer(
        &self,
        request: TransferRequest,
        now: TimeMs,
    ) -> Result<P2PTransfer, TransferError> {
        self.initiate(request, None, now).await
    }

    /// Like `initiate_transfer`, but the pending payment request `request_id`
    /// is marked paid in the same transaction that moves the funds. Fails with
    /// `RequestClosed`, moving nothing, if the request was settled first.
    pub async fn initiate_request_payment(
        &self,
        request: TransferRequest,
        request_id: &str,
        now: TimeMs,
    ) -> Result<P2PTransfer, TransferError> {
        self.initiate(request, Some(request_id), now).await
    }

    async fn initiate(
        &self,
        request: TransferRequest,
        pays_request: Option<&str>,
        now: TimeMs,
    ) -> Result<P2PTransfer, TransferError> {
        let note = request
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if matches!(&note, Some(n) if n.chars().count() > MAX_NOTE_CHARS) {
            return Err(TransferError::Invalid(format!(
                "note must be at most {} characters",
                MAX_NOTE_CHARS
            )));
        }

        let preview = self
            .preview(&request.sender_id, &request.receiver_id, request.amount, now)
            .await?;
        let missing = preview.verification.missing(&request.verification);
        if !missing.is_empty() {
            return Err(TransferError::VerificationRequired(missing));
        }

        let transfer = P2PTransfer {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: request.sender_id,
            receiver_id: request.receiver_id,
            amount: request.amount,
            note,
            status: TransferStatus::Pending,
            risk_score: preview.risk_score,
            failure_reason: None,
            created_ms: now,
            updated_ms: now,
            completed_ms: None,
        };
        let mut conn = self.repo.pool().acquire().await?;
        transfers::insert_transfer(&mut conn, &transfer).await?;
        drop(conn);

        info!(
            transfer_id = %transfer.id,
            sender = %transfer.sender_id,
            receiver = %transfer.receiver_id,
            amount = %transfer.amount,
            risk_score = %transfer.risk_score,
            "Transfer initiated"
        );

        self.process(&transfer.id, pays_request, now).await
    }

    /// Move a pending transfer through processing to completed or failed.
    pub async fn process_transfer(
        &self,
        id: &str,
        now: TimeMs,
    ) -> Result<P2PTransfer, TransferError> {
        self.process(id, None, now).await
    }

    async fn process(
        &self,
        id: &str,
        pays_request: Option<&str>,
        now: TimeMs,
    ) -> Result<P2PTransfer, TransferError> {
        let mut conn = self.repo.pool().acquire().await?;
        let transfer = transfers::get_transfer(&mut conn, id)
            .await?
            .ok_or_else(|| TransferError::NotFound(id.to_string()))?;
        if !transfer.status.can_transition_to(TransferStatus::Processing)
            || !transfers::transition_transfer(
                &mut conn,
                id,
                TransferStatus::Pending,
                TransferStatus::Processing,
                None,
                now,
            )
            .await?
        {
            return Err(TransferError::InvalidState {
                id: id.to_string(),
                status: transfer.status,
            });
        }
        drop(conn);

        match self.settle(&transfer, pays_request, now).await {
            Ok(completed) => {
                info!(transfer_id = %id, "Transfer completed");
                self.notify_completed(&completed, now).await;
                Ok(completed)
            }
            Err(e) => {
                warn!(transfer_id = %id, error = %e, "Transfer failed");
                self.mark_failed(id, &e.to_string(), now).await;
                Err(e)
            }
        }
    }

    async fn settle(
        &self,
        transfer: &P2PTransfer,
        pays_request: Option<&str>,
        now: TimeMs,
    ) -> Result<P2PTransfer, TransferError> {
        let sender = &transfer.sender_id;
        let receiver = &transfer.receiver_id;
        let amount = transfer.amount;

        let mut tx = self.repo.begin().await?;
        if wallets::bump_version(&mut tx, sender, now).await?.is_none() {
            return Err(TransferError::WalletNotFound(sender.clone()));
        }

        if let Some(request_id) = pays_request {
            let paid = transfers::resolve_payment_request(
                &mut tx,
                request_id,
                PaymentRequestStatus::Paid,
                Some(&transfer.id),
                now,
            )
            .await?;
            if !paid {
                return Err(TransferError::RequestClosed(request_id.to_string()));
            }
        }

        let limits = transfers::get_limits(&mut tx, sender)
            .await?
            .unwrap_or_default();
        check_transfer_limits(&limits, amount, now)?;

        let sender_balance = bankroll(&mut tx, sender).await?;
        if sender_balance < amount {
            return Err(TransferError::InsufficientFunds {
                available: sender_balance,
                requested: amount,
            });
        }
        wallets::set_bankroll(&mut tx, sender, sender_balance - amount).await?;

        if wallets::bump_version(&mut tx, receiver, now).await?.is_none() {
            return Err(TransferError::WalletNotFound(receiver.clone()));
        }
        let receiver_balance = bankroll(&mut tx, receiver).await?;
        wallets::set_bankroll(&mut tx, receiver, receiver_balance + amount).await?;

        transfers::upsert_limits(&mut tx, sender, &record_spend(&limits, amount, now), now)
            .await?;
        wallets::insert_wallet_tx(
            &mut tx,
            sender,
            None,
            WalletTxKind::TransferOut,
            -amount,
            Some(&transfer.id),
            now,
        )
        .await?;
        wallets::insert_wallet_tx(
            &mut tx,
            receiver,
            None,
            WalletTxKind::TransferIn,
            amount,
            Some(&transfer.id),
            now,
        )
        .await?;

        if !transfers::transition_transfer(
            &mut tx,
            &transfer.id,
            TransferStatus::Processing,
            TransferStatus::Completed,
            None,
            now,
        )
        .await?
        {
            let status = transfers::get_transfer(&mut tx, &transfer.id)
                .await?
                .map(|t| t.status)
                .unwrap_or(TransferStatus::Failed);
            return Err(TransferError::InvalidState {
                id: transfer.id.clone(),
                status,
            });
        }

        let completed = transfers::get_transfer(&mut tx, &transfer.id)
            .await?
            .ok_or_else(|| TransferError::NotFound(transfer.id.clone()))?;
        tx.commit().await?;
        Ok(completed)
    }

    async fn mark_failed(&self, id: &str, reason: &str, now: TimeMs) {
        let result = async {
            let mut conn = self.repo.pool().acquire().await?;
            transfers::transition_transfer(
                &mut conn,
                id,
                TransferStatus::Processing,
                TransferStatus::Failed,
                Some(reason),
                now,
            )
            .await
        }
        .await;
        if let Err(e) = result {
            error!(transfer_id = %id, error = %e, "Could not record transfer failure");
        }
    }

    async fn notify_completed(&self, transfer: &P2PTransfer, now: TimeMs) {
        let amount = format!("${:.2}", transfer.amount.inner());
        let action = Some(format!("/transfers/{}", transfer.id));
        let tag = format!("transfer-{}", transfer.id);

        self.notifications
            .enqueue_best_effort(
                NewNotification {
                    user_id: transfer.sender_id.clone(),
                    title: "Transfer sent".to_string(),
                    body: format!("You sent {} to {}", amount, transfer.receiver_id),
                    icon: None,
                    action: action.clone(),
                    tag: tag.clone(),
                },
                now,
            )
            .await;
        self.notifications
            .enqueue_best_effort(
                NewNotification {
                    user_id: transfer.receiver_id.clone(),
                    title: "Money received".to_string(),
                    body: format!("{} sent you {}", transfer.sender_id, amount),
                    icon: None,
                    action,
                    tag,
                },
                now,
            )
            .await;
    }

    /// Cancel a transfer that has not started processing. Sender only.
    pub async fn cancel_transfer(
        &self,
        id: &str,
        user: &UserId,
        now: TimeMs,
    ) -> Result<P2PTransfer, TransferError> {
        let mut conn = self.repo.pool().acquire().await?;
        let transfer = transfers::get_transfer(&mut conn, id)
            .await?
            .ok_or_else(|| TransferError::NotFound(id.to_string()))?;
        if &transfer.sender_id != user {
            return Err(TransferError::NotSender);
        }
        let cancelled = transfer.status.can_transition_to(TransferStatus::Cancelled)
            && transfers::transition_transfer(
                &mut conn,
                id,
                TransferStatus::Pending,
                TransferStatus::Cancelled,
                None,
                now,
            )
            .await?;
        if !cancelled {
            return Err(TransferError::InvalidState {
                id: id.to_string(),
                status: transfer.status,
            });
        }

        info!(transfer_id = %id, "Transfer cancelled");
        transfers::get_transfer(&mut conn, id)
            .await?
            .ok_or_else(|| TransferError::NotFound(id.to_string()))
    }

    pub async fn get_transfer(&self, id: &str) -> Result<P2PTransfer, TransferError> {
        self.repo
            .get_transfer(id)
            .await?
            .ok_or_else(|| TransferError::NotFound(id.to_string()))
    }

    pub async fn list_transfers(
        &self,
        user: &UserId,
        limit: Option<i64>,
    ) -> Result<Vec<P2PTransfer>, TransferError> {
        let limit = limit.unwrap_or(50).clamp(1, MAX_LIST_LIMIT);
        Ok(self.repo.list_transfers_for_user(user, limit).await?)
    }

    /// Fail transfers that have been open longer than the stale age. Such rows
    /// never moved funds because settlement and completion commit together.
    pub async fn fail_stale_transfers(&self, now: TimeMs) -> Result<Vec<String>, TransferError> {
        self.fail_open_before(now.minus_ms(self.policy.stale_after_ms), now)
            .await
    }

    /// Fail every open transfer regardless of age. Only safe before the
    /// server accepts requests, when nothing can be in flight.
    pub async fn recover_interrupted_transfers(
        &self,
        now: TimeMs,
    ) -> Result<Vec<String>, TransferError> {
        self.fail_open_before(now.plus_ms(1), now).await
    }

    async fn fail_open_before(
        &self,
        cutoff: TimeMs,
        now: TimeMs,
    ) -> Result<Vec<String>, TransferError> {
        let mut conn = self.repo.pool().acquire().await?;
        let failed = transfers::fail_stale_transfers(
            &mut conn,
            cutoff,
            "interrupted before completion",
            now,
        )
        .await?;
        if !failed.is_empty() {
            warn!(count = failed.len(), "Failed interrupted transfers");
        }
        Ok(failed)
    }

    /// Stored limits, or the defaults for users who never changed them.
    pub async fn get_limits(&self, user: &UserId) -> Result<UserLimits, TransferError> {
        Ok(self.repo.get_limits(user).await?.unwrap_or_default())
    }

    /// Replace a user's limit values. Spend counters are preserved.
    pub async fn update_limits(
        &self,
        user: &UserId,
        new_limits: &UserLimits,
        now: TimeMs,
    ) -> Result<UserLimits, TransferError> {
        validate_limits(new_limits).map_err(TransferError::Invalid)?;
        if self.repo.get_user_created(user).await?.is_none() {
            return Err(TransferError::WalletNotFound(user.clone()));
        }

        let mut tx = self.repo.begin().await?;
        transfers::ensure_limits_row(&mut tx, user, now).await?;
        transfers::set_limit_values(&mut tx, user, new_limits, now).await?;
        let stored = transfers::get_limits(&mut tx, user)
            .await?
            .unwrap_or_default();
        tx.commit().await?;

        info!(user = %user, "Updated transfer limits");
        Ok(stored)
    }
}

async fn bankroll(conn: &mut SqliteConnection, user: &UserId) -> Result<Decimal, TransferError> {
    wallets::get_bankroll(conn, user)
        .await?
        .ok_or_else(|| TransferError::WalletNotFound(user.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::setup_repo;
    use crate::domain::{PlatformId, SpendWindow, MS_PER_DAY};
    use crate::engine::limits::window_starts;
    use crate::engine::LimitKind;
    use crate::orchestration::wallets::WalletService;

    // 2024-05-15 13:00 UTC
    const NOW: TimeMs = TimeMs(1_715_778_000_000);

    fn uid(s: &str) -> UserId {
        UserId::new(s.to_string())
    }

    struct Fixture {
        repo: Arc<Repository>,
        wallets: WalletService,
        transfers: TransferService,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let (repo, dir) = setup_repo().await;
        let wallets = WalletService::new(repo.clone(), vec![PlatformId::Sleeper]);
        let transfers = TransferService::new(
            repo.clone(),
            NotificationService::new(repo.clone()),
            TransferPolicy {
                trusted_recipient_min_transfers: 3,
                stale_after_ms: 300_000,
            },
        );
        // Accounts are old enough that age does not add risk.
        let created = NOW.minus_ms(90 * MS_PER_DAY);
        for user in ["alice", "bob"] {
            wallets.initialize_user_wallet(&uid(user), created).await.unwrap();
        }
        Fixture {
            repo,
            wallets,
            transfers,
            _dir: dir,
        }
    }

    fn request(amount: Decimal) -> TransferRequest {
        TransferRequest {
            sender_id: uid("alice"),
            receiver_id: uid("bob"),
            amount,
            note: Some("rent".to_string()),
            verification: VerificationProof::all(),
        }
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_notifies() {
        let f = fixture().await;
        f.wallets
            .deposit_bankroll(&uid("alice"), Decimal::from_units(100), None, NOW)
            .await
            .unwrap();

        let transfer = f
            .transfers
            .initiate_transfer(request(Decimal::from_units(40)), NOW)
            .await
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Completed);
        assert_eq!(transfer.completed_ms, Some(NOW));
        assert_eq!(transfer.risk_score, Decimal::from_scaled(2, 1));

        let alice = f.wallets.get_wallet(&uid("alice")).await.unwrap();
        let bob = f.wallets.get_wallet(&uid("bob")).await.unwrap();
        assert_eq!(alice.bankroll_balance, Decimal::from_units(60));
        assert_eq!(bob.bankroll_balance, Decimal::from_units(40));

        let limits = f.transfers.get_limits(&uid("alice")).await.unwrap();
        assert_eq!(limits.daily.spent, Decimal::from_units(40));

        let pending = f
            .repo
            .take_pending_notifications(&uid("bob"), NOW)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].body, "alice sent you $40.00");
    }

    #[tokio::test]
    async fn test_daily_limit_rejects_and_records_failure() {
        let f = fixture().await;
        f.wallets
            .deposit_bankroll(&uid("alice"), Decimal::from_units(1_000), None, NOW)
            .await
            .unwrap();

        let (day, _, _) = window_starts(NOW);
        let mut limits = UserLimits::default();
        limits.daily = SpendWindow {
            spent: Decimal::from_units(2_400),
            window_start: day,
        };
        let mut conn = f.repo.pool().acquire().await.unwrap();
        transfers::upsert_limits(&mut conn, &uid("alice"), &limits, NOW)
            .await
            .unwrap();
        drop(conn);

        let err = f
            .transfers
            .initiate_transfer(request(Decimal::from_units(200)), NOW)
            .await
            .unwrap_err();
        match &err {
            TransferError::Limit(v) => assert_eq!(v.kind, LimitKind::Daily),
            other => panic!("expected limit violation, got {:?}", other),
        }
        assert!(err.to_string().contains("daily limit"));

        let listed = f.transfers.list_transfers(&uid("alice"), None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, TransferStatus::Failed);
        assert!(listed[0]
            .failure_reason
            .as_deref()
            .unwrap_or_default()
            .contains("daily limit"));

        let alice = f.wallets.get_wallet(&uid("alice")).await.unwrap();
        assert_eq!(alice.bankroll_balance, Decimal::from_units(1_000));
    }

    #[tokio::test]
    async fn test_concurrent_transfers_only_one_completes() {
        let f = fixture().await;
        f.wallets
            .deposit_bankroll(&uid("alice"), Decimal::from_units(50), None, NOW)
            .await
            .unwrap();

        let a = f.transfers.clone();
        let b = f.transfers.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move {
                a.initiate_transfer(request(Decimal::from_units(50)), NOW)
                    .await
            }),
            tokio::spawn(async move {
                b.initiate_transfer(request(Decimal::from_units(50)), NOW)
                    .await
            }),
        );
        let results = [ra.unwrap(), rb.unwrap()];
        let completed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(completed, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(TransferError::InsufficientFunds { .. }))));

        let alice = f.wallets.get_wallet(&uid("alice")).await.unwrap();
        let bob = f.wallets.get_wallet(&uid("bob")).await.unwrap();
        assert_eq!(alice.bankroll_balance, Decimal::zero());
        assert_eq!(bob.bankroll_balance, Decimal::from_units(50));
    }

    #[tokio::test]
    async fn test_verification_required_before_recording() {
        let f = fixture().await;
        let mut req = request(Decimal::from_units(600));
        req.verification = VerificationProof {
            pin: true,
            ..Default::default()
        };
        let err = f.transfers.initiate_transfer(req, NOW).await.unwrap_err();
        match err {
            TransferError::VerificationRequired(missing) => assert_eq!(missing, vec!["biometric"]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(f
            .transfers
            .list_transfers(&uid("alice"), None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let f = fixture().await;
        let mut req = request(Decimal::from_units(10));
        req.receiver_id = uid("alice");
        assert!(matches!(
            f.transfers.initiate_transfer(req, NOW).await,
            Err(TransferError::SelfTransfer)
        ));

        let mut req = request(Decimal::from_units(10));
        req.receiver_id = uid("nobody");
        assert!(matches!(
            f.transfers.initiate_transfer(req, NOW).await,
            Err(TransferError::WalletNotFound(u)) if u == uid("nobody")
        ));

        assert!(matches!(
            f.transfers
                .initiate_transfer(request(Decimal::from_scaled(1_001, 3)), NOW)
                .await,
            Err(TransferError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_only_pending_and_only_sender() {
        let f = fixture().await;
        let pending = P2PTransfer {
            id: "t-pending".to_string(),
            sender_id: uid("alice"),
            receiver_id: uid("bob"),
            amount: Decimal::from_units(5),
            note: None,
            status: TransferStatus::Pending,
            risk_score: Decimal::zero(),
            failure_reason: None,
            created_ms: NOW,
            updated_ms: NOW,
            completed_ms: None,
        };
        let mut conn = f.repo.pool().acquire().await.unwrap();
        transfers::insert_transfer(&mut conn, &pending).await.unwrap();
        drop(conn);

        assert!(matches!(
            f.transfers.cancel_transfer("t-pending", &uid("bob"), NOW).await,
            Err(TransferError::NotSender)
        ));
        let cancelled = f
            .transfers
            .cancel_transfer("t-pending", &uid("alice"), NOW)
            .await
            .unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);
        assert!(matches!(
            f.transfers.cancel_transfer("t-pending", &uid("alice"), NOW).await,
            Err(TransferError::InvalidState {
                status: TransferStatus::Cancelled,
                ..
            })
        ));
        assert!(matches!(
            f.transfers.process_transfer("t-pending", NOW).await,
            Err(TransferError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_preview_trust_after_repeat_transfers() {
        let f = fixture().await;
        f.wallets
            .deposit_bankroll(&uid("alice"), Decimal::from_units(100), None, NOW)
            .await
            .unwrap();

        let before = f
            .transfers
            .preview(&uid("alice"), &uid("bob"), Decimal::from_units(1_500), NOW)
            .await
            .unwrap();
        assert!(before.first_time_recipient);
        assert!(before.verification.two_factor);

        for _ in 0..3 {
            f.transfers
                .initiate_transfer(request(Decimal::from_units(1)), NOW)
                .await
                .unwrap();
        }

        let after = f
            .transfers
            .preview(&uid("alice"), &uid("bob"), Decimal::from_units(1_500), NOW)
            .await
            .unwrap();
        assert!(after.trusted_recipient);
        assert!(!after.verification.two_factor);
        assert!(after.verification.biometric);
    }

    #[tokio::test]
    async fn test_update_limits_validates_and_keeps_counters() {
        let f = fixture().await;
        f.wallets
            .deposit_bankroll(&uid("alice"), Decimal::from_units(100), None, NOW)
            .await
            .unwrap();
        f.transfers
            .initiate_transfer(request(Decimal::from_units(30)), NOW)
            .await
            .unwrap();

        let mut bad = UserLimits::default();
        bad.daily_limit = Decimal::from_units(50_000);
        assert!(matches!(
            f.transfers.update_limits(&uid("alice"), &bad, NOW).await,
            Err(TransferError::Invalid(_))
        ));

        let mut new_limits = UserLimits::default();
        new_limits.per_transaction_limit = Decimal::from_units(200);
        let stored = f
            .transfers
            .update_limits(&uid("alice"), &new_limits, NOW)
            .await
            .unwrap();
        assert_eq!(stored.per_transaction_limit, Decimal::from_units(200));
        assert_eq!(stored.daily.spent, Decimal::from_units(30));
    }

    #[tokio::test]
    async fn test_fail_stale_transfers() {
        let f = fixture().await;
        let stale = P2PTransfer {
            id: "t-stale".to_string(),
            sender_id: uid("alice"),
            receiver_id: uid("bob"),
            amount: Decimal::from_units(5),
            note: None,
            status: TransferStatus::Processing,
            risk_score: Decimal::zero(),
            failure_reason: None,
            created_ms: NOW.minus_ms(600_000),
            updated_ms: NOW.minus_ms(600_000),
            completed_ms: None,
        };
        let mut conn = f.repo.pool().acquire().await.unwrap();
        transfers::insert_transfer(&mut conn, &stale).await.unwrap();
        drop(conn);

        let failed = f.transfers.fail_stale_transfers(NOW).await.unwrap();
        assert_eq!(failed, vec!["t-stale".to_string()]);
        let stored = f.transfers.get_transfer("t-stale").await.unwrap();
        assert_eq!(stored.status, TransferStatus::Failed);
    }

    #[tokio::test]
    async fn test_startup_recovery_fails_recent_open_transfers() {
        let f = fixture().await;
        let interrupted = P2PTransfer {
            id: "t-recent".to_string(),
            sender_id: uid("alice"),
            receiver_id: uid("bob"),
            amount: Decimal::from_units(5),
            note: None,
            status: TransferStatus::Processing,
            risk_score: Decimal::zero(),
            failure_reason: None,
            created_ms: NOW.minus_ms(10_000),
            updated_ms: NOW.minus_ms(10_000),
            completed_ms: None,
        };
        let mut conn = f.repo.pool().acquire().await.unwrap();
        transfers::insert_transfer(&mut conn, &interrupted).await.unwrap();
        drop(conn);

        // Too young for the periodic sweep, and stuck for cancel and process.
        assert!(f.transfers.fail_stale_transfers(NOW).await.unwrap().is_empty());
        assert!(f.transfers.cancel_transfer("t-recent", &uid("alice"), NOW).await.is_err());
        assert!(f.transfers.process_transfer("t-recent", NOW).await.is_err());

        let failed = f.transfers.recover_interrupted_transfers(NOW).await.unwrap();
        assert_eq!(failed, vec!["t-recent".to_string()]);
        let stored = f.transfers.get_transfer("t-recent").await.unwrap();
        assert_eq!(stored.status, TransferStatus::Failed);
        assert_eq!(
            stored.failure_reason.as_deref(),
            Some("interrupted before completion")
        );
    }
}
