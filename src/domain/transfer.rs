//! Peer-to-peer transfers, spend limits and payment requests.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Processing => "processing",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }

    /// pending -> processing -> completed | failed; pending -> cancelled | failed.
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "processing" => Ok(TransferStatus::Processing),
            "completed" => Ok(TransferStatus::Completed),
            "failed" => Ok(TransferStatus::Failed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(format!("unknown transfer status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct P2PTransfer {
    pub id: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub status: TransferStatus,
    pub risk_score: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_ms: TimeMs,
    pub updated_ms: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_ms: Option<TimeMs>,
}

/// Spend counter for one rolling calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendWindow {
    pub spent: Decimal,
    /// Start of the window the counter belongs to.
    pub window_start: TimeMs,
}

impl SpendWindow {
    pub fn empty() -> Self {
        SpendWindow {
            spent: Decimal::zero(),
            window_start: TimeMs::new(0),
        }
    }
}

/// Per-user transfer limits and running spend counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLimits {
    pub per_transaction_limit: Decimal,
    pub daily_limit: Decimal,
    pub weekly_limit: Decimal,
    pub monthly_limit: Decimal,
    pub daily: SpendWindow,
    pub weekly: SpendWindow,
    pub monthly: SpendWindow,
}

impl Default for UserLimits {
    fn default() -> Self {
        UserLimits {
            per_transaction_limit: Decimal::from_units(1_000),
            daily_limit: Decimal::from_units(2_500),
            weekly_limit: Decimal::from_units(10_000),
            monthly_limit: Decimal::from_units(25_000),
            daily: SpendWindow::empty(),
            weekly: SpendWindow::empty(),
            monthly: SpendWindow::empty(),
        }
    }
}

/// Verification steps the client reports as completed for a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationProof {
    pub pin: bool,
    pub biometric: bool,
    pub two_factor: bool,
    pub email_confirmation: bool,
}

impl VerificationProof {
    pub fn all() -> Self {
        VerificationProof {
            pin: true,
            biometric: true,
            two_factor: true,
            email_confirmation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRequestStatus {
    Pending,
    Paid,
    Declined,
    Cancelled,
}

impl PaymentRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRequestStatus::Pending => "pending",
            PaymentRequestStatus::Paid => "paid",
            PaymentRequestStatus::Declined => "declined",
            PaymentRequestStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for PaymentRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentRequestStatus::Pending),
            "paid" => Ok(PaymentRequestStatus::Paid),
            "declined" => Ok(PaymentRequestStatus::Declined),
            "cancelled" => Ok(PaymentRequestStatus::Cancelled),
            other => Err(format!("unknown payment request status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub id: String,
    pub requester_id: UserId,
    pub payer_id: UserId,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub status: PaymentRequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
    pub created_ms: TimeMs,
    pub updated_ms: TimeMs,
}
