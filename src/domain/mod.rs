//! Domain types for the Bankroll wallet service.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Primitives: TimeMs, UserId
//! - The partner platform catalog with explicit availability rules
//! - Wallet, transfer, location, group and notification records

pub mod decimal;
pub mod group;
pub mod location;
pub mod notification;
pub mod platform;
pub mod primitives;
pub mod transfer;
pub mod wallet;

pub use decimal::Decimal;
pub use group::{Expense, ExpenseSplit, GroupWallet};
pub use location::{Coordinates, LocationSource, UserLocation};
pub use notification::{NewNotification, Notification};
pub use platform::{Availability, PlatformCategory, PlatformId, UnknownPlatform};
pub use primitives::{TimeMs, UserId, UserIdParseError, MS_PER_DAY};
pub use transfer::{
    P2PTransfer, PaymentRequest, PaymentRequestStatus, SpendWindow, TransferStatus, UserLimits,
    VerificationProof,
};
pub use wallet::{
    BonusBalance, BonusStatus, MainWallet, SubWallet, SubWalletStatus, WalletTxKind,
};
