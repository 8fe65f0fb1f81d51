use std::sync::Arc;

use sea_orm_migration::MigratorTrait;
use vidtube_api::config::Settings;
use vidtube_api::state::AppState;
use vidtube_api::store::DbIdentityStore;
use vidtube_session::{SessionConfig, SessionService};

async fn init_state(settings: &Settings) -> anyhow::Result<AppState> {
    let db = Arc::new(vidtube_db::connect(&settings.database_url).await?);

    // Apply migrations on boot (idempotent).
    vidtube_migration::Migrator::up(&*db, None).await?;

    let sessions = SessionService::new(
        SessionConfig::from_env(),
        Arc::new(DbIdentityStore::new(db.clone())),
    );

    Ok(AppState {
        db,
        sessions: Arc::new(sessions),
        allowed_origins: Arc::new(settings.allowed_origins.clone()),
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env()?;
    let state = init_state(&settings).await?;
    tracing::debug!(config = ?state.sessions.config(), "session config loaded");

    let app = vidtube_api::app(state);
    let addr = settings.bind_addr;
    tracing::info!(%addr, "vidtube HTTP listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
