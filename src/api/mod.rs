pub mod groups;
pub mod health;
pub mod limits;
pub mod location;
pub mod notifications;
pub mod payment_requests;
pub mod platforms;
pub mod transfers;
pub mod wallets;

use crate::config::Config;
use crate::datasource::GeoSource;
use crate::db::Repository;
use crate::domain::{Decimal, PlatformId, UserId};
use crate::error::AppError;
use crate::orchestration::{
    GroupService, LocationResolver, NotificationService, PaymentRequestService, TransferPolicy,
    TransferService, WalletService,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub wallets: WalletService,
    pub transfers: TransferService,
    pub payment_requests: PaymentRequestService,
    pub groups: GroupService,
    pub notifications: NotificationService,
    pub location: Arc<LocationResolver>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, geo: Arc<dyn GeoSource>) -> Self {
        let notifications = NotificationService::new(repo.clone());
        let transfers = TransferService::new(
            repo.clone(),
            notifications.clone(),
            TransferPolicy {
                trusted_recipient_min_transfers: config.trusted_recipient_min_transfers,
                stale_after_ms: config.stale_transfer_secs.saturating_mul(1_000),
            },
        );
        let payment_requests =
            PaymentRequestService::new(repo.clone(), transfers.clone(), notifications.clone());
        Self {
            wallets: WalletService::new(repo.clone(), config.default_platforms.clone()),
            groups: GroupService::new(repo.clone()),
            location: Arc::new(LocationResolver::new(geo, &config.geo)),
            transfers,
            payment_requests,
            notifications,
            repo,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/wallets/:user", get(wallets::get_wallet))
        .route(
            "/v1/wallets/:user/initialize",
            post(wallets::initialize_wallet),
        )
        .route("/v1/wallets/:user/changes", get(wallets::get_changes))
        .route(
            "/v1/wallets/:user/sub-wallets",
            post(wallets::create_sub_wallet),
        )
        .route(
            "/v1/wallets/:user/sub-wallets/:platform/cash",
            post(wallets::adjust_cash),
        )
        .route(
            "/v1/wallets/:user/sub-wallets/:platform/bonuses",
            post(wallets::grant_bonus),
        )
        .route(
            "/v1/wallets/:user/sub-wallets/:platform/bonuses/consume",
            post(wallets::consume_bonus),
        )
        .route(
            "/v1/wallets/:user/bankroll/deposit",
            post(wallets::deposit_bankroll),
        )
        .route(
            "/v1/limits/:user",
            get(limits::get_limits).put(limits::update_limits),
        )
        .route(
            "/v1/transfers",
            get(transfers::list_transfers).post(transfers::create_transfer),
        )
        .route("/v1/transfers/preview", get(transfers::preview_transfer))
        .route("/v1/transfers/:id", get(transfers::get_transfer))
        .route("/v1/transfers/:id/cancel", post(transfers::cancel_transfer))
        .route(
            "/v1/payment-requests",
            get(payment_requests::list_requests).post(payment_requests::create_request),
        )
        .route(
            "/v1/payment-requests/:id/pay",
            post(payment_requests::pay_request),
        )
        .route(
            "/v1/payment-requests/:id/decline",
            post(payment_requests::decline_request),
        )
        .route(
            "/v1/payment-requests/:id/cancel",
            post(payment_requests::cancel_request),
        )
        .route("/v1/location/:user/detect", post(location::detect))
        .route(
            "/v1/location/:user/manual",
            put(location::set_manual).delete(location::clear_manual),
        )
        .route("/v1/platforms", get(platforms::get_platforms))
        .route("/v1/promotions/:state", get(platforms::get_promotions))
        .route("/v1/groups", post(groups::create_group))
        .route("/v1/groups/:id", get(groups::get_group))
        .route("/v1/groups/:id/expenses", post(groups::add_expense))
        .route(
            "/v1/notifications/pending",
            get(notifications::get_pending),
        )
        .route(
            "/v1/notifications/dismissed",
            post(notifications::dismiss),
        )
        .layer(cors)
        .with_state(state)
}

/// Body of endpoints where the acting user is the only input.
#[derive(Debug, Deserialize)]
pub struct ActorBody {
    pub user: String,
}

pub(crate) fn parse_user(raw: &str) -> Result<UserId, AppError> {
    raw.parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid user id {:?}: {}", raw, e)))
}

pub(crate) fn parse_platform(raw: &str) -> Result<PlatformId, AppError> {
    raw.parse()
        .map_err(|e: crate::domain::UnknownPlatform| AppError::BadRequest(e.to_string()))
}

pub(crate) fn parse_amount(field: &str, raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str_canonical(raw)
        .map_err(|_| AppError::BadRequest(format!("{} must be a decimal number", field)))
}
