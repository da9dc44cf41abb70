//! Login broker server
//!
//! Runs the HTTP edge over the session manager and the idle-attempt reaper.

use std::sync::Arc;

use anyhow::{Context, Result};
use login_core::domains::sessions::JsonFileSessionStore;
use login_core::domains::auth::SessionManager;
use login_core::kernel::{
    start_scheduler, BaseNotifier, BotNotifier, GatewayTransport, LogNotifier, ServerDeps,
};
use login_core::server::build_app;
use login_core::Config;
use login_gateway::{BotOptions, BotService, GatewayOptions, GatewayService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,login_core=debug,login_gateway=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting login broker");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        owner_id = %config.owner_id,
        permitted_users = config.permitted_users.len(),
        public = config.allow_public_use,
        "Configuration loaded"
    );

    // Platform gateway
    let gateway = Arc::new(GatewayService::new(GatewayOptions {
        base_url: config.gateway_url.clone(),
        api_id: config.api_id,
        api_hash: config.api_hash.clone(),
    }));

    // Notifications go through the bot when it is configured
    let notifier: Arc<dyn BaseNotifier> = match &config.bot_token {
        Some(token) => Arc::new(BotNotifier::new(Arc::new(BotService::new(BotOptions {
            token: token.clone(),
            api_url: config.bot_api_url.clone(),
        })))),
        None => {
            tracing::warn!("BOT_TOKEN not set, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let sessions = JsonFileSessionStore::open(&config.session_path)
        .await
        .context("Failed to open session store")?;

    let server_deps = Arc::new(ServerDeps::new(
        Arc::new(GatewayTransport::new(gateway)),
        notifier,
        Arc::new(sessions),
        config.access_policy(),
        config.login_settings(),
    ));
    let manager = Arc::new(SessionManager::new(server_deps));

    // Scheduled tasks
    let _scheduler = start_scheduler(manager.clone())
        .await
        .context("Failed to start scheduled tasks")?;

    // Build application
    let app = build_app(manager);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
