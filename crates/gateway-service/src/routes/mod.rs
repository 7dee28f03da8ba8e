mod auth;
mod coords;
mod riders;

use crate::middleware::require_auth;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use broker_rpc::CommandClient;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared gateway state: one client proxy per backing service.
pub struct AppState {
    pub auth: Arc<CommandClient>,
    pub riders: Arc<CommandClient>,
    pub coords: Arc<CommandClient>,
}

pub fn build_routes(state: Arc<AppState>) -> Router {
    // Everything except registration and login requires a bearer token.
    let protected = Router::new()
        .route("/api/v1/riders", post(riders::create_rider))
        .route("/api/v1/riders/:id", get(riders::get_rider))
        .route("/api/v1/coordinates", post(coords::save_coordinates))
        .route("/api/v1/coordinates/:rider", get(coords::get_coordinates))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    Router::new()
        // Public authentication endpoints
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .merge(protected)
        // Health check
        .route("/health", get(health_check))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
