use axum::{
    routing::{get, patch, post, put},
    Router,
};

use super::alert_handlers;
use crate::state::AppState;

pub fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(alert_handlers::list_alerts))
        .route("/generate", post(alert_handlers::generate_alerts))
        .route("/stats", get(alert_handlers::alert_stats))
        .route("/config", get(alert_handlers::list_alert_configs))
        .route("/config/:type", put(alert_handlers::update_alert_config))
        .route("/:id/resolve", patch(alert_handlers::resolve_alert))
}
