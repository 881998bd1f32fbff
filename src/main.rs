//! Horizonte Storefront - storefront API and back office

use anyhow::Result;
use horizonte_storefront::{auth::bootstrap_admin, build_router, AppState, Config, EventPublisher};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, url = %url, "NATS unavailable, domain events disabled"); None }
        },
        None => None,
    };

    bootstrap_admin(&db, &config).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let port = config.port;
    let events = EventPublisher::new(nats);
    tracing::info!(events = events.is_enabled(), currency = %config.currency, "configuration loaded");
    let state = AppState::new(db, config, events);
    let app = build_router(state);

    tracing::info!("Horizonte Storefront listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
