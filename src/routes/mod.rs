use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, set_security_headers};
use crate::handlers::{events, health_check, locations};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/events", get(events::list_events).post(events::create_event))
        .route("/api/events/count", get(events::count_events))
        .route("/api/events/:id", put(events::update_event))
        .route(
            "/api/locations/:id/availability",
            get(locations::list_availability),
        )
        .route(
            "/api/locations/:id/availability/toggle",
            post(locations::toggle_availability),
        )
        .layer(axum::middleware::map_response(set_security_headers))
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
