//! Wallet endpoints: initialization, incremental sync and balance moves.

use super::{parse_platform, parse_user, AppState};
use crate::domain::{
    BonusBalance, BonusStatus, Decimal, MainWallet, PlatformCategory, PlatformId, SubWallet,
    SubWalletStatus, TimeMs, UserId,
};
use crate::error::AppError;
use crate::orchestration::{BonusGrant, WalletChanges};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusView {
    pub id: String,
    pub amount: Decimal,
    pub initial_amount: Decimal,
    pub date_granted: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_expires: Option<TimeMs>,
    /// Status at response time, so unswept expired bonuses read as expired.
    pub status: BonusStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWalletView {
    pub platform: PlatformId,
    pub display_name: &'static str,
    pub category: PlatformCategory,
    pub cash_balance: Decimal,
    pub total_bonus_balance: Decimal,
    pub bonus_balances: Vec<BonusView>,
    pub connected: bool,
    pub created: TimeMs,
    pub status: SubWalletStatus,
    pub version: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    pub user_id: UserId,
    pub bankroll_balance: Decimal,
    pub total_cash_balance: Decimal,
    pub total_bonus_balance: Decimal,
    pub available_withdrawal: Decimal,
    pub version: i64,
    pub created: TimeMs,
    pub sub_wallets: Vec<SubWalletView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesView {
    pub version: i64,
    pub bankroll_balance: Decimal,
    pub sub_wallets: Vec<SubWalletView>,
}

fn bonus_view(bonus: &BonusBalance, now: TimeMs) -> BonusView {
    BonusView {
        id: bonus.id.clone(),
        amount: bonus.amount,
        initial_amount: bonus.initial_amount,
        date_granted: bonus.date_granted,
        date_expires: bonus.date_expires,
        status: bonus.effective_status(now),
    }
}

fn sub_wallet_view(sub_wallet: &SubWallet, now: TimeMs) -> SubWalletView {
    SubWalletView {
        platform: sub_wallet.platform,
        display_name: sub_wallet.platform.display_name(),
        category: sub_wallet.platform.category(),
        cash_balance: sub_wallet.cash_balance,
        total_bonus_balance: sub_wallet.total_bonus_balance(now),
        bonus_balances: sub_wallet
            .bonus_balances
            .iter()
            .map(|b| bonus_view(b, now))
            .collect(),
        connected: sub_wallet.connected,
        created: sub_wallet.created,
        status: sub_wallet.status,
        version: sub_wallet.version,
    }
}

fn wallet_view(wallet: &MainWallet, now: TimeMs) -> WalletView {
    WalletView {
        user_id: wallet.user.clone(),
        bankroll_balance: wallet.bankroll_balance,
        total_cash_balance: wallet.total_cash_balance(),
        total_bonus_balance: wallet.total_bonus_balance(now),
        available_withdrawal: wallet.available_withdrawal(),
        version: wallet.version,
        created: wallet.created,
        sub_wallets: wallet
            .sub_wallets
            .values()
            .map(|w| sub_wallet_view(w, now))
            .collect(),
    }
}

fn changes_view(changes: &WalletChanges, now: TimeMs) -> ChangesView {
    ChangesView {
        version: changes.version,
        bankroll_balance: changes.bankroll_balance,
        sub_wallets: changes
            .sub_wallets
            .iter()
            .map(|w| sub_wallet_view(w, now))
            .collect(),
    }
}

pub async fn initialize_wallet(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WalletView>, AppError> {
    let user = parse_user(&user)?;
    let now = TimeMs::now();
    let wallet = state.wallets.initialize_user_wallet(&user, now).await?;
    Ok(Json(wallet_view(&wallet, now)))
}

pub async fn get_wallet(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WalletView>, AppError> {
    let user = parse_user(&user)?;
    let wallet = state.wallets.get_wallet(&user).await?;
    Ok(Json(wallet_view(&wallet, TimeMs::now())))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesQuery {
    #[serde(default)]
    pub since_version: i64,
}

pub async fn get_changes(
    Path(user): Path<String>,
    Query(params): Query<ChangesQuery>,
    State(state): State<AppState>,
) -> Result<Json<ChangesView>, AppError> {
    let user = parse_user(&user)?;
    let changes = state
        .wallets
        .changes_since(&user, params.since_version)
        .await?;
    Ok(Json(changes_view(&changes, TimeMs::now())))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubWalletBody {
    pub platform: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSubWalletResponse {
    pub platform: PlatformId,
    pub created: bool,
}

pub async fn create_sub_wallet(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<CreateSubWalletBody>,
) -> Result<(StatusCode, Json<CreateSubWalletResponse>), AppError> {
    let user = parse_user(&user)?;
    let platform = parse_platform(&body.platform)?;
    let created = state
        .wallets
        .create_sub_wallet(&user, platform, TimeMs::now())
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreateSubWalletResponse { platform, created })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustCashBody {
    /// Signed: positive credits, negative debits.
    pub amount: Decimal,
    pub expected_version: Option<i64>,
    pub reference: Option<String>,
}

pub async fn adjust_cash(
    Path((user, platform)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<AdjustCashBody>,
) -> Result<Json<SubWalletView>, AppError> {
    let user = parse_user(&user)?;
    let platform = parse_platform(&platform)?;
    let now = TimeMs::now();
    let sub_wallet = state
        .wallets
        .adjust_cash(
            &user,
            platform,
            body.amount,
            body.expected_version,
            body.reference.as_deref(),
            now,
        )
        .await?;
    Ok(Json(sub_wallet_view(&sub_wallet, now)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBonusBody {
    pub amount: Decimal,
    pub expires_ms: Option<i64>,
    pub state_code: Option<String>,
}

pub async fn grant_bonus(
    Path((user, platform)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<GrantBonusBody>,
) -> Result<(StatusCode, Json<BonusView>), AppError> {
    let user = parse_user(&user)?;
    let platform = parse_platform(&platform)?;
    let now = TimeMs::now();
    let grant = BonusGrant {
        amount: body.amount,
        expires: body.expires_ms.map(TimeMs::new),
        state_code: body.state_code,
    };
    let bonus = state.wallets.grant_bonus(&user, platform, grant, now).await?;
    Ok((StatusCode::CREATED, Json(bonus_view(&bonus, now))))
}

#[derive(Debug, Deserialize)]
pub struct AmountBody {
    pub amount: Decimal,
    pub reference: Option<String>,
}

pub async fn consume_bonus(
    Path((user, platform)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<AmountBody>,
) -> Result<Json<SubWalletView>, AppError> {
    let user = parse_user(&user)?;
    let platform = parse_platform(&platform)?;
    let now = TimeMs::now();
    let sub_wallet = state
        .wallets
        .consume_bonus(&user, platform, body.amount, now)
        .await?;
    Ok(Json(sub_wallet_view(&sub_wallet, now)))
}

pub async fn deposit_bankroll(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<AmountBody>,
) -> Result<Json<WalletView>, AppError> {
    let user = parse_user(&user)?;
    let now = TimeMs::now();
    let wallet = state
        .wallets
        .deposit_bankroll(&user, body.amount, body.reference.as_deref(), now)
        .await?;
    Ok(Json(wallet_view(&wallet, now)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_wallet_view_reports_effective_bonus_status() {
        let now = TimeMs::new(10_000);
        let sub_wallet = SubWallet {
            user: UserId::new("alice".to_string()),
            platform: PlatformId::Draftkings,
            cash_balance: Decimal::from_units(40),
            bonus_balances: vec![
                BonusBalance {
                    id: "live".to_string(),
                    amount: Decimal::from_units(15),
                    initial_amount: Decimal::from_units(20),
                    date_granted: TimeMs::new(0),
                    date_expires: Some(TimeMs::new(20_000)),
                    status: BonusStatus::Active,
                },
                BonusBalance {
                    id: "stale".to_string(),
                    amount: Decimal::from_units(5),
                    initial_amount: Decimal::from_units(5),
                    date_granted: TimeMs::new(0),
                    date_expires: Some(TimeMs::new(9_000)),
                    status: BonusStatus::Active,
                },
            ],
            connected: true,
            created: TimeMs::new(0),
            status: SubWalletStatus::Active,
            version: 4,
        };

        let view = sub_wallet_view(&sub_wallet, now);
        assert_eq!(view.display_name, "DraftKings");
        assert_eq!(view.total_bonus_balance, Decimal::from_units(15));
        assert_eq!(view.bonus_balances[1].status, BonusStatus::Expired);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["platform"], "draftkings");
        assert_eq!(json["cashBalance"], 40.0);
        assert_eq!(json["bonusBalances"][0]["initialAmount"], 20.0);
    }
}
