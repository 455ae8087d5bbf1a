mod alert;
mod auth;
mod db;
mod error;
mod middleware;
mod notification;
mod realtime;
mod routes;
mod schedule;
mod state;
mod user;

use std::sync::Arc;

use alert::{AlertConfigRepository, AlertEngine, AlertRepository, SqlMetricSource};
use db::{create_pool, run_migrations};
use notification::{
    EmailConfig, EmailTransport, NotificationDispatcher, NotificationRepository,
    SmtpEmailTransport,
};
use realtime::HubHandle;
use routes::create_router;
use schedule::{ScheduleRepository, ScheduleService};
use state::{AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user::UserRepository;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lab_manager=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    tracing::info!("Connecting to database...");
    let db = create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    // Create repositories
    let user_repository = UserRepository::new(db.clone());
    let schedule_repository = ScheduleRepository::new(db.clone());
    let alert_repository = AlertRepository::new(db.clone());
    let alert_config_repository = AlertConfigRepository::new(db.clone());
    let notification_repository = NotificationRepository::new(db.clone());
    let metric_source = SqlMetricSource::new(db.clone());

    // Connection registry actor; the single owner of websocket state.
    let hub = HubHandle::spawn();

    // Email transport is optional; without SMTP_HOST the channel is off.
    let mailer: Option<Arc<dyn EmailTransport>> = match EmailConfig::from_env() {
        Some(email_config) => {
            tracing::info!("Email channel enabled via {}", email_config.smtp_host);
            Some(Arc::new(SmtpEmailTransport::new(email_config)))
        }
        None => {
            tracing::info!("SMTP_HOST not set; email channel disabled");
            None
        }
    };

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(user_repository.clone()),
        Arc::new(notification_repository.clone()),
        Arc::new(alert_config_repository.clone()),
        hub.clone(),
        mailer,
    ));

    let alert_engine = Arc::new(AlertEngine::new(
        Arc::new(alert_config_repository.clone()),
        Arc::new(metric_source),
        Arc::new(alert_repository.clone()),
        dispatcher.clone(),
    ));

    let schedule_service = ScheduleService::new(
        schedule_repository,
        user_repository.clone(),
        dispatcher.clone(),
        config.min_weekly_hours,
    );

    // Create application state
    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        hub: hub.clone(),
        alert_engine: alert_engine.clone(),
        alert_repository,
        alert_config_repository,
        notification_repository,
        user_repository,
        schedule_service,
    };

    // Start the periodic alert scan
    let mut scheduler =
        alert::start_alert_scheduler(alert_engine.clone(), &config.alert_scan_cron).await?;

    // Create router
    let app = create_router(state);

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop scheduling new scans, then let an in-flight scan finish so we
    // never exit with half-persisted alert state.
    scheduler.shutdown().await?;
    alert_engine.wait_idle().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
