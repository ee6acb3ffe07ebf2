use anyhow::Context;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dojo_server::{config, db, jobs, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dojo_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load settings
    let settings = config::Settings::new().context("Failed to load settings")?;

    // Initialize database
    let db = db::Database::new(&settings.database.path).context("Failed to create database")?;
    db.initialize().context("Failed to initialize database schema")?;

    if settings.seed_demo_data {
        db.seed_demo_data().context("Failed to seed demo data")?;
        tracing::info!("Demo data seeded (password for every demo account: dojo123)");
    }

    tracing::info!("Database initialized successfully");

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Failed to parse server address")?;
    let sweep_every = settings.orders.sweep_interval_secs.max(60);
    let expiration_days = settings.orders.expiration_days;

    // Create application state
    let state = AppState::new(db, settings);

    // Run initial session cleanup on startup
    match state.session_manager.cleanup_expired_sessions() {
        Ok(count) if count > 0 => tracing::info!("Cleaned up {} expired sessions on startup", count),
        Ok(_) => tracing::info!("No expired sessions to clean up"),
        Err(e) => tracing::error!("Failed to cleanup expired sessions on startup: {}", e),
    }

    // Periodic session cleanup
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            tracing::debug!("Running periodic session cleanup...");
            match cleanup_state.session_manager.cleanup_expired_sessions() {
                Ok(count) if count > 0 => {
                    tracing::info!("Periodic cleanup: removed {} expired sessions", count)
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Periodic session cleanup failed: {}", e),
            }
        }
    });

    // Periodic expiration of stale pending orders
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(sweep_every));
        loop {
            interval.tick().await;
            match jobs::expire_pending_orders(&sweep_state.db, expiration_days) {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!("Order sweep: cancelled {} expired orders", expired.len())
                }
                Ok(_) => tracing::debug!("Order sweep: nothing to cancel"),
                Err(e) => tracing::error!("Order sweep failed: {}", e),
            }
        }
    });

    let app = routes::build_router(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
