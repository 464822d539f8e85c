//! Wallet endpoint tests: initialization, derived totals, bonuses and
//! incremental sync.

mod common;

use axum::http::StatusCode;
use bankroll::TimeMs;
use common::{as_f64, setup_test_app};
use serde_json::json;

#[tokio::test]
async fn test_initialize_is_idempotent_and_creates_default_sub_wallets() {
    let app = setup_test_app().await;

    let (status, first) = app.send("POST", "/v1/wallets/alice/initialize", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["userId"], "alice");
    assert_eq!(first["subWallets"].as_array().unwrap().len(), 10);
    assert_eq!(as_f64(&first["bankrollBalance"]), 0.0);

    let (status, second) = app.send("POST", "/v1/wallets/alice/initialize", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["version"], first["version"]);
    assert_eq!(second["created"], first["created"]);
}

#[tokio::test]
async fn test_missing_wallet_and_bad_ids() {
    let app = setup_test_app().await;

    let (status, body) = app.get("/v1/wallets/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nobody"));

    let (status, _) = app.get("/v1/wallets/bad%20id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.funded_user("alice", 0.0).await;
    let (status, _) = app
        .post(
            "/v1/wallets/alice/sub-wallets/pointsbet/cash",
            json!({ "amount": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_totals_exclude_bonus_from_withdrawal() {
    let app = setup_test_app().await;
    app.funded_user("alice", 100.0).await;

    let (status, _) = app
        .post(
            "/v1/wallets/alice/sub-wallets/fanduel/cash",
            json!({ "amount": 50, "reference": "deposit-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, bonus) = app
        .post(
            "/v1/wallets/alice/sub-wallets/fanduel/bonuses",
            json!({ "amount": 20, "stateCode": "NJ" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(as_f64(&bonus["amount"]), 30.0);
    assert_eq!(bonus["status"], "active");

    let (status, wallet) = app.get("/v1/wallets/alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_f64(&wallet["totalCashBalance"]), 50.0);
    assert_eq!(as_f64(&wallet["totalBonusBalance"]), 30.0);
    assert_eq!(as_f64(&wallet["availableWithdrawal"]), 150.0);
}

#[tokio::test]
async fn test_bonus_rejected_in_restricted_state() {
    let app = setup_test_app().await;
    app.funded_user("alice", 0.0).await;

    let (status, body) = app
        .post(
            "/v1/wallets/alice/sub-wallets/sleeper/bonuses",
            json!({ "amount": 20, "stateCode": "nv" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("NV"));
}

#[tokio::test]
async fn test_consume_bonus_draws_soonest_expiring_first() {
    let app = setup_test_app().await;
    app.funded_user("alice", 0.0).await;
    let soon = TimeMs::now().plus_ms(3_600_000).as_ms();
    let later = TimeMs::now().plus_ms(7_200_000).as_ms();

    for (amount, expires) in [(10, later), (5, soon)] {
        let (status, _) = app
            .post(
                "/v1/wallets/alice/sub-wallets/draftkings/bonuses",
                json!({ "amount": amount, "expiresMs": expires }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, sub_wallet) = app
        .post(
            "/v1/wallets/alice/sub-wallets/draftkings/bonuses/consume",
            json!({ "amount": 7 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_f64(&sub_wallet["totalBonusBalance"]), 8.0);
    let bonuses = sub_wallet["bonusBalances"].as_array().unwrap();
    let used = bonuses.iter().find(|b| b["status"] == "used").unwrap();
    assert_eq!(as_f64(&used["initialAmount"]), 5.0);

    let (status, _) = app
        .post(
            "/v1/wallets/alice/sub-wallets/draftkings/bonuses/consume",
            json!({ "amount": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cash_overdraft_and_version_conflict() {
    let app = setup_test_app().await;
    app.funded_user("alice", 0.0).await;

    let (status, _) = app
        .post(
            "/v1/wallets/alice/sub-wallets/betmgm/cash",
            json!({ "amount": -1 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, wallet) = app.get("/v1/wallets/alice").await;
    let version = wallet["version"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/v1/wallets/alice/sub-wallets/betmgm/cash",
            json!({ "amount": 25, "expectedVersion": version }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/v1/wallets/alice/sub-wallets/betmgm/cash",
            json!({ "amount": 25, "expectedVersion": version }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("version conflict"));
}

#[tokio::test]
async fn test_changes_since_returns_only_touched_sub_wallets() {
    let app = setup_test_app().await;
    app.funded_user("alice", 0.0).await;

    let (_, wallet) = app.get("/v1/wallets/alice").await;
    let seen = wallet["version"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/v1/wallets/alice/sub-wallets/caesars/cash",
            json!({ "amount": 12.5 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, changes) = app
        .get(&format!("/v1/wallets/alice/changes?sinceVersion={}", seen))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(changes["version"].as_i64().unwrap() > seen);
    let sub_wallets = changes["subWallets"].as_array().unwrap();
    assert_eq!(sub_wallets.len(), 1);
    assert_eq!(sub_wallets[0]["platform"], "caesars");
    assert_eq!(as_f64(&sub_wallets[0]["cashBalance"]), 12.5);

    let (_, everything) = app.get("/v1/wallets/alice/changes").await;
    assert_eq!(everything["subWallets"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_create_sub_wallet_reports_existing() {
    let app = setup_test_app().await;
    app.funded_user("alice", 0.0).await;

    let (status, body) = app
        .post("/v1/wallets/alice/sub-wallets", json!({ "platform": "fan_duel" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["platform"], "fanduel");
    assert_eq!(body["created"], false);
}
