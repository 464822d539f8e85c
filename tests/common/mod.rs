//! Shared harness for endpoint tests: a router over a temp SQLite database
//! and a mock geolocation source.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bankroll::api::{self, AppState};
use bankroll::config::Config;
use bankroll::db::init_db;
use bankroll::{MockGeoSource, Repository};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestApp {
    pub app: axum::Router,
    pub state: AppState,
    pub geo: MockGeoSource,
    _temp: TempDir,
}

pub async fn setup_test_app() -> TestApp {
    setup_with_geo(MockGeoSource::new()).await
}

pub async fn setup_with_geo(geo: MockGeoSource) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let config = Config::for_database(&db_path);
    let state = AppState::new(repo, config, Arc::new(geo.clone()));
    let app = api::create_router(state.clone());

    TestApp {
        app,
        state,
        geo,
        _temp: temp_dir,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send("DELETE", uri, None).await
    }

    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Initialize a user's wallet and fund their bankroll.
    pub async fn funded_user(&self, user: &str, bankroll: f64) {
        let (status, _) = self
            .send("POST", &format!("/v1/wallets/{}/initialize", user), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        if bankroll > 0.0 {
            let (status, body) = self
                .post(
                    &format!("/v1/wallets/{}/bankroll/deposit", user),
                    serde_json::json!({ "amount": bankroll }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
        }
    }
}

pub fn as_f64(value: &Value) -> f64 {
    value.as_f64().unwrap_or_else(|| panic!("not a number: {}", value))
}
