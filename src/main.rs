//! Storefront Orders - order lifecycle and refund-request service

use std::sync::Arc;

use anyhow::Result;
use storefront_orders::{
    auth::TokenVerifier,
    config::Config,
    publisher::EventPublisher,
    routes,
    service::OrderLifecycle,
    state::AppState,
    store::{Database, PgStore},
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "storefront_orders=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let store = Arc::new(PgStore::new(Database::new(config.database_url.clone(), config.database_max_connections)));
    store.migrate().await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(error) => {
                tracing::warn!(%error, "NATS unavailable, domain events will not be published");
                None
            }
        },
        None => None,
    };

    let verifier = TokenVerifier::new(config.jwt_secret.clone());
    if !verifier.has_secret() {
        tracing::warn!("JWT_SECRET is not set, every credential will be rejected");
    }

    let lifecycle = OrderLifecycle::new(store.clone(), store, EventPublisher::new(nats));
    let state = AppState::new(lifecycle, verifier, &config.cookie_name);
    let app = routes::router(state).layer(CorsLayer::permissive());

    let addr = config.socket_addr();
    tracing::info!("Storefront orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
