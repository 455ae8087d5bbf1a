use axum::{
    middleware,
    routing::{get, patch},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    alert::{self, alert_dto::*, alert_handlers, alert_repository::*, alert_models::*, ScanSummary},
    middleware::auth_middleware,
    notification::{notification_handlers, Notification},
    realtime,
    schedule::{self, schedule_dto::*, schedule_handlers, schedule_models::*},
    state::AppState,
    user::{Role, User},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        alert_handlers::generate_alerts,
        alert_handlers::list_alerts,
        alert_handlers::resolve_alert,
        alert_handlers::alert_stats,
        schedule_handlers::submit_schedule,
        schedule_handlers::approve_schedule,
        schedule_handlers::reject_schedule,
        notification_handlers::get_notifications,
        notification_handlers::mark_notification_read,
    ),
    components(
        schemas(
            Alert,
            AlertType,
            AlertSeverity,
            AlertConfig,
            Thresholds,
            ScanSummary,
            AlertStats,
            SeverityCounts,
            TypeCounts,
            AlertListQuery,
            ResolveAlertRequest,
            UpdateAlertConfigRequest,
            WorkSchedule,
            ScheduleBlock,
            ScheduleStatus,
            CreateScheduleRequest,
            CreateBlockRequest,
            RejectScheduleRequest,
            Notification,
            User,
            Role,
        )
    ),
    tags(
        (name = "alerts", description = "Alert detection and resolution"),
        (name = "schedules", description = "Weekly schedule lifecycle"),
        (name = "notifications", description = "In-app notification history")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let alert_routes = alert::routes::alert_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    let schedule_routes = schedule::routes::schedule_routes().route_layer(
        middleware::from_fn_with_state(state.clone(), auth_middleware),
    );

    let notification_routes = Router::new()
        .route("/", get(notification_handlers::get_notifications))
        .route(
            "/:id/read",
            patch(notification_handlers::mark_notification_read),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .nest("/alerts", alert_routes)
        .nest("/schedules", schedule_routes)
        .nest("/notifications", notification_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        // Websocket clients authenticate in-band, not via the middleware.
        .route("/ws", get(realtime::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
