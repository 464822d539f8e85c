use anyhow::Context;
use bankroll::orchestration::{spawn_sweeper, Sweeper};
use bankroll::{api, config::Config, db::init_db, GeoSource, HttpGeoSource, Repository, TimeMs};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));
    let geo: Arc<dyn GeoSource> = Arc::new(HttpGeoSource::new(config.geo.clone()));

    let state = api::AppState::new(repo, config.clone(), geo);

    // Nothing is in flight before we serve, so every open transfer was
    // interrupted by a previous process and never moved funds.
    state
        .transfers
        .recover_interrupted_transfers(TimeMs::now())
        .await
        .context("Failed to recover interrupted transfers")?;

    let _sweeper = spawn_sweeper(
        Sweeper {
            wallets: state.wallets.clone(),
            transfers: state.transfers.clone(),
            location: state.location.clone(),
        },
        config.sweep_interval_secs,
    );

    let app = api::create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
