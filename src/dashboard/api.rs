//! JSON proxy endpoints for scripted clients and client-side editors.

use super::server::DashboardState;
use crate::agents::{Agent, AgentSummary, GatewayError};
use crate::document;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ConfigRequest {
    config: String,
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Local YAML failures come back as 422 with the parser location.
fn invalid_config(err: &document::DocumentError) -> Response {
    let (line, column) = err.location().unzip();
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "error": err.message(),
            "line": line,
            "column": column,
        })),
    )
        .into_response()
}

pub(super) async fn health_handler(State(state): State<DashboardState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        uptime: state.start_time.elapsed().as_secs(),
    })
}

pub(super) async fn agents_handler(
    State(state): State<DashboardState>,
) -> Result<Json<Vec<AgentSummary>>, Response> {
    state.gateway.list_agents().await.map(Json).map_err(|e| {
        error!("Error fetching agents: {}", e);
        error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch agents")
    })
}

pub(super) async fn agent_handler(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, Response> {
    state.gateway.get_agent(&id).await.map(Json).map_err(|e| match e {
        GatewayError::NotFound(_) => not_found(),
        e => {
            error!("Error fetching agent {}: {}", id, e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch agent data")
        }
    })
}

pub(super) async fn save_config_handler(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
    Json(req): Json<ConfigRequest>,
) -> Response {
    if let Err(e) = document::parse(&req.config) {
        return invalid_config(&e);
    }

    match state.gateway.save_config(&id, &req.config).await {
        Ok(ack) => Json(json!({ "status": ack.status })).into_response(),
        Err(GatewayError::NotFound(_)) => not_found(),
        Err(e) => {
            error!("Error updating agent config for {}: {}", id, e);
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update agent configuration",
            )
        }
    }
}

pub(super) async fn rotate_cert_handler(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
) -> Response {
    match state.gateway.rotate_client_cert(&id).await {
        Ok(ack) => Json(json!({ "status": ack.status })).into_response(),
        Err(GatewayError::NotFound(_)) => not_found(),
        Err(e) => {
            error!("Error rotating client certificate for {}: {}", id, e);
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to rotate client certificate",
            )
        }
    }
}

pub(super) async fn format_handler(Json(req): Json<ConfigRequest>) -> Response {
    match document::format(&req.config) {
        Ok(formatted) => Json(json!({ "formatted": formatted })).into_response(),
        Err(e) => invalid_config(&e),
    }
}
