//! Periodic background jobs.

use crate::domain::TimeMs;
use crate::orchestration::location::LocationResolver;
use crate::orchestration::transfers::TransferService;
use crate::orchestration::wallets::WalletService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Services the sweeper maintains.
#[derive(Clone)]
pub struct Sweeper {
    pub wallets: WalletService,
    pub transfers: TransferService,
    pub location: Arc<LocationResolver>,
}

impl Sweeper {
    /// One pass: expire due bonuses, fail transfers stuck open past the stale
    /// age and drop expired cached locations. A failing job does not stop the
    /// others.
    pub async fn run_once(&self, now: TimeMs) {
        if let Err(e) = self.wallets.sweep_expired_bonuses(now).await {
            error!(error = %e, "Bonus expiry sweep failed");
        }
        if let Err(e) = self.transfers.fail_stale_transfers(now).await {
            error!(error = %e, "Stale transfer sweep failed");
        }
        let pruned = self.location.prune_expired(now).await;
        if pruned > 0 {
            debug!(pruned, "Pruned expired cached locations");
        }
    }
}

/// Run `Sweeper::run_once` every `interval_secs`. Returns `None` when
/// disabled (interval of 0).
pub fn spawn_sweeper(sweeper: Sweeper, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!("Sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweeper.run_once(TimeMs::now()).await;
        }
    }))
}
