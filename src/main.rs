use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reviewdesk::api::middleware::{
    auth::require_auth,
    session::{create_session_layer, AppState},
};
use reviewdesk::config::Config;
use reviewdesk::db;
use reviewdesk::services::delivery::{email::SendGridAdapter, sms::TwilioAdapter, DeliveryAdapters};
use reviewdesk::services::dispatcher::{Dispatcher, PgDispatchStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reviewdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ReviewDesk server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create session layer
    let secure_cookies = config.base_url.starts_with("https://");
    let session_layer = create_session_layer(pool.clone(), secure_cookies).await?;
    tracing::info!("Session layer initialized");

    // Delivery providers
    let adapters = DeliveryAdapters::new(
        Arc::new(SendGridAdapter::new(
            config.sendgrid.clone(),
            config.provider_timeout_secs,
        )),
        Arc::new(TwilioAdapter::new(
            config.twilio.clone(),
            config.provider_timeout_secs,
        )),
    );
    if config.sendgrid.api_key.is_none() {
        tracing::warn!("SendGrid is not configured; email requests will fail");
    }
    if config.twilio.account_sid.is_none() {
        tracing::warn!("Twilio is not configured; SMS requests will fail");
    }

    let dispatcher = Dispatcher::new(Arc::new(PgDispatchStore::new(pool.clone())), adapters);

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        dispatcher: Arc::new(dispatcher),
    };

    // Owner-facing API, behind the session
    let protected = Router::new()
        .merge(reviewdesk::api::locations::router())
        .merge(reviewdesk::api::review_requests::router())
        .merge(reviewdesk::api::review_templates::router())
        .merge(reviewdesk::api::crm_integrations::router())
        .route_layer(axum::middleware::from_fn(require_auth));

    // Build router
    let app = Router::new()
        .route("/health", get(reviewdesk::api::health::health_check))
        .merge(protected)
        .merge(reviewdesk::api::crm_integrations::hooks_router())
        .merge(reviewdesk::api::webhooks::router())
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let host: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((host, config.port));
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        return;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
