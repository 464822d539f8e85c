mod common;

use axum::http::StatusCode;
use common::{as_f64, setup_test_app};
use serde_json::json;

#[tokio::test]
async fn test_group_expense_splits_keep_zero_sum() {
    let app = setup_test_app().await;

    let (status, group) = app
        .post(
            "/v1/groups",
            json!({ "name": "Vegas trip", "members": ["alice", "bob", "carol"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", group);
    let id = group["id"].as_str().unwrap().to_string();
    assert_eq!(group["memberBalances"].as_object().unwrap().len(), 3);

    let (status, group) = app
        .post(
            &format!("/v1/groups/{}/expenses", id),
            json!({
                "paidBy": "alice",
                "amount": 100,
                "description": "hotel",
                "split": { "type": "equal", "participants": ["alice", "bob", "carol"] },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", group);
    assert_eq!(as_f64(&group["memberBalances"]["alice"]), 66.66);
    assert_eq!(as_f64(&group["memberBalances"]["bob"]), -33.33);

    let (status, group) = app
        .post(
            &format!("/v1/groups/{}/expenses", id),
            json!({
                "paidBy": "bob",
                "amount": 30,
                "description": "cab",
                "split": { "type": "exact", "shares": { "alice": 20, "carol": 10 } },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", group);

    let balances = group["memberBalances"].as_object().unwrap();
    let total: f64 = balances.values().map(as_f64).sum();
    assert!(total.abs() < 1e-9);
    assert_eq!(as_f64(&balances["alice"]), 46.66);
    assert_eq!(group["expenses"].as_array().unwrap().len(), 2);

    let (status, fetched) = app.get(&format!("/v1/groups/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, group);
}

#[tokio::test]
async fn test_group_rejections() {
    let app = setup_test_app().await;

    let (status, _) = app
        .post("/v1/groups", json!({ "name": "Solo", "members": ["alice"] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, group) = app
        .post(
            "/v1/groups",
            json!({ "name": "Rent", "members": ["alice", "bob"] }),
        )
        .await;
    let uri = format!("/v1/groups/{}/expenses", group["id"].as_str().unwrap());

    let (status, _) = app
        .post(
            &uri,
            json!({
                "paidBy": "alice",
                "amount": 60,
                "description": "utilities",
                "split": { "type": "exact", "shares": { "alice": 30, "bob": 20 } },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &uri,
            json!({
                "paidBy": "mallory",
                "amount": 10,
                "description": "snacks",
                "split": { "type": "equal", "participants": ["alice", "bob"] },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.get("/v1/groups/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
