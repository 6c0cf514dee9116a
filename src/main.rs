//! # Feeding Tracker Bot Main Entry Point
//!
//! Initializes logging, loads configuration, sets up the database, starts the
//! reminder service and the health server, and runs the Telegram bot.

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feeding_tracker_bot::bot::dialog::FeedingDialog;
use feeding_tracker_bot::bot::handlers::BotHandler;
use feeding_tracker_bot::bot::transport::Messenger;
use feeding_tracker_bot::config::Config;
use feeding_tracker_bot::database::connection::DatabaseManager;
use feeding_tracker_bot::database::models::FeedingLog;
use feeding_tracker_bot::services::health::HealthService;
use feeding_tracker_bot::services::reminder::{ReminderChecker, ReminderService};
use feeding_tracker_bot::services::timezone::{SystemClock, TimezoneService};
use feeding_tracker_bot::utils::logging::log_system_event;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feeding_tracker_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting Feeding Tracker Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded - Database: {}, HTTP Port: {}, whitelist: {:?}",
        config.database_url,
        config.http_port,
        config.whitelist.names()
    );
    if config.whitelist.is_empty() {
        tracing::warn!("TELEGRAM_USERNAME_WHITELIST is empty; every user will be rejected");
    }

    info!("Initializing database connection...");
    let db_manager = DatabaseManager::new(&config.database_url).await?;
    db_manager.run_migrations().await?;
    let normalized =
        FeedingLog::normalize_pending(&db_manager.pool, None, config.server_timezone).await?;
    if normalized > 0 {
        log_system_event(
            "Normalized legacy feeding timestamps",
            Some(&format!("{} rows", normalized)),
        );
    }
    let db_arc = Arc::new(db_manager);
    info!("Database initialized successfully");

    let bot = Bot::new(&config.telegram_bot_token);
    let messenger: Arc<dyn Messenger> = Arc::new(bot.clone());
    let timezone = TimezoneService::new(
        config.user_timezone,
        config.server_timezone,
        Arc::new(SystemClock),
    );

    let dialog = Arc::new(FeedingDialog::new(
        messenger.clone(),
        db_arc.as_ref().clone(),
        timezone.clone(),
        config.whitelist.clone(),
        config.time_offsets.clone(),
    ));
    let handler = BotHandler::new(dialog);

    let checker = Arc::new(ReminderChecker::new(
        messenger,
        db_arc.as_ref().clone(),
        timezone,
        config.whitelist.clone(),
        config.reminders.threshold,
        config.reminders.mode,
    ));
    let mut reminder_service = match ReminderService::new(checker, &config.reminders).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to create reminder service: {}", e);
            return Err(anyhow::anyhow!("Failed to create reminder service: {}", e));
        }
    };

    if let Err(e) = reminder_service.start().await {
        tracing::error!("Failed to start reminder service: {}", e);
    }

    let health_service = HealthService::new(db_arc.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {}", config.http_port, e))?;

    info!("Health check server starting on port {}", config.http_port);

    let bot_task = tokio::spawn(async move {
        Dispatcher::builder(bot, handler.schema())
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });

    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_service.router).await {
            tracing::error!("Health server error: {}", e);
        }
    });

    tokio::select! {
        result1 = bot_task => {
            if let Err(e) = result1 {
                tracing::error!("Bot task error: {}", e);
            }
        }
        result2 = health_task => {
            if let Err(e) = result2 {
                tracing::error!("Health task error: {}", e);
            }
        }
    }

    if let Err(e) = reminder_service.stop().await {
        tracing::warn!("Error stopping reminder service: {}", e);
    }

    log_system_event("Application stopped", None);
    Ok(())
}
