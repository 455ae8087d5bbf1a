use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::schedule_handlers;
use crate::state::AppState;

pub fn schedule_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(schedule_handlers::create_schedule))
        .route("/:id", get(schedule_handlers::get_schedule))
        .route("/:id/blocks", post(schedule_handlers::add_block))
        .route(
            "/:id/blocks/:block_id",
            delete(schedule_handlers::delete_block),
        )
        .route("/:id/submit", post(schedule_handlers::submit_schedule))
        .route("/:id/approve", put(schedule_handlers::approve_schedule))
        .route("/:id/reject", put(schedule_handlers::reject_schedule))
        .route("/:id/reopen", post(schedule_handlers::reopen_schedule))
}
