use super::AppState;
use crate::error::AppError;
use axum::{extract::State, Json};

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the database answers.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    sqlx::query("SELECT 1")
        .execute(state.repo.pool())
        .await
        .map_err(|e| AppError::Unavailable(format!("database: {}", e)))?;
    Ok(Json(serde_json::json!({"status": "ready"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::datasource::MockGeoSource;
    use crate::db::repo::test_support::setup_repo;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_checks_database() {
        let (repo, _dir) = setup_repo().await;
        let state = AppState::new(
            repo.clone(),
            Config::for_database("unused.db"),
            Arc::new(MockGeoSource::new()),
        );
        let Json(body) = ready(State(state.clone())).await.unwrap();
        assert_eq!(body["status"], "ready");

        repo.pool().close().await;
        assert!(matches!(
            ready(State(state)).await,
            Err(AppError::Unavailable(_))
        ));
    }
}
