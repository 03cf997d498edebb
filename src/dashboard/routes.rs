use super::server::DashboardState;
use super::{api, pages};

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build all routes for the dashboard.
pub fn build_routes(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes: Router<DashboardState> = Router::new()
        .route("/api/health", get(api::health_handler))
        .route("/api/agents", get(api::agents_handler))
        .route(
            "/api/agent/{id}",
            get(api::agent_handler).post(api::save_config_handler),
        )
        .route("/api/agent/{id}/rotate_cert", post(api::rotate_cert_handler))
        .route("/api/format", post(api::format_handler))
        .layer(cors);

    Router::new()
        // Pages
        .route("/", get(pages::agent_list_page))
        .route("/agent/{id}", get(pages::agent_detail_page))
        // Form actions
        .route("/agent/{id}/config/{action}", post(pages::config_action))
        .route("/agent/{id}/rotate_cert", post(pages::rotate_cert_action))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
