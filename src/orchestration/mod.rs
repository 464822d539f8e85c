//! Services that combine repository access with the pure rules in `engine`.

pub mod groups;
pub mod location;
pub mod notifications;
pub mod payment_requests;
pub mod sweeper;
pub mod transfers;
pub mod wallets;

pub use groups::{GroupError, GroupService};
pub use location::{DetectRequest, LocationError, LocationResolver};
pub use notifications::NotificationService;
pub use payment_requests::{PaymentRequestError, PaymentRequestService};
pub use sweeper::{spawn_sweeper, Sweeper};
pub use transfers::{
    TransferError, TransferPolicy, TransferPreview, TransferRequest, TransferService,
};
pub use wallets::{BonusGrant, WalletChanges, WalletError, WalletService};
