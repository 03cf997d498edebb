//! HTML page and form handlers.

use super::server::DashboardState;
use super::views::{self, DetailPage, Notice, Tab};
use crate::agents::{Agent, GatewayError};
use crate::sessions::{EditSession, SessionError, SessionMode, SessionView};

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

// ============================================================================
// Agent List
// ============================================================================

pub(super) async fn agent_list_page(State(state): State<DashboardState>) -> Response {
    match state.gateway.list_agents().await {
        Ok(agents) => Html(views::agent_list(&agents)).into_response(),
        Err(e) => {
            error!("Error fetching agents: {}", e);
            (StatusCode::BAD_GATEWAY, Html(views::agent_list_error())).into_response()
        }
    }
}

// ============================================================================
// Agent Detail
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub(super) struct DetailQuery {
    tab: Option<String>,
    view: Option<String>,
    notice: Option<String>,
}

pub(super) async fn agent_detail_page(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Response {
    let agent = match load_agent(&state, &id).await {
        Ok(agent) => agent,
        Err(response) => return response,
    };

    let session = resolve_session(&state, query.view.as_deref(), &agent);
    let page = DetailPage {
        agent: &agent,
        session: &session,
        tab: Tab::from_query(query.tab.as_deref()),
        notice: Notice::from_query(query.notice.as_deref()),
    };
    Html(page.render()).into_response()
}

/// Fetch an agent, turning failures into the terminal not-found / error pages.
async fn load_agent(state: &DashboardState, id: &str) -> Result<Agent, Response> {
    match state.gateway.get_agent(id).await {
        Ok(agent) => Ok(agent),
        Err(GatewayError::NotFound(_)) => {
            debug!("Agent {} not found", id);
            Err((StatusCode::NOT_FOUND, Html(views::agent_not_found(id))).into_response())
        }
        Err(e) => {
            error!("Error fetching agent {}: {}", id, e);
            Err((StatusCode::BAD_GATEWAY, Html(views::agent_detail_error())).into_response())
        }
    }
}

/// Reuse the requested session when it is still open for this agent,
/// otherwise start a new one from the freshly fetched configuration.
fn resolve_session(state: &DashboardState, requested: Option<&str>, agent: &Agent) -> SessionView {
    if let Some(view) = requested
        .and_then(|id| state.sessions.view(id))
        .filter(|view| view.agent_id == agent.instance_id)
    {
        return view;
    }

    let view_id = state
        .sessions
        .open(&agent.instance_id, &agent.effective_config);
    SessionView {
        view_id,
        agent_id: agent.instance_id.clone(),
        mode: SessionMode::Viewing,
        text: agent.effective_config.clone(),
        last_error: None,
        dirty: false,
    }
}

// ============================================================================
// Config Editor Actions
// ============================================================================

#[derive(Debug, Deserialize)]
pub(super) struct ConfigForm {
    view: String,
    config: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorAction {
    Edit,
    Format,
    Cancel,
    Save,
    Close,
}

impl EditorAction {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "edit" => Some(Self::Edit),
            "format" => Some(Self::Format),
            "cancel" => Some(Self::Cancel),
            "save" => Some(Self::Save),
            "close" => Some(Self::Close),
            _ => None,
        }
    }
}

pub(super) async fn config_action(
    State(state): State<DashboardState>,
    Path((id, action)): Path<(String, String)>,
    Form(form): Form<ConfigForm>,
) -> Response {
    let Some(action) = EditorAction::parse(&action) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if action == EditorAction::Close {
        state.sessions.close(&form.view);
        return Redirect::to("/").into_response();
    }

    let owned = state
        .sessions
        .view(&form.view)
        .is_some_and(|view| view.agent_id == id);
    if !owned {
        debug!("Edit session {} is gone, reloading agent {}", form.view, id);
        let href = views::detail_href(&id, Tab::Config, None, Some(Notice::SessionExpired));
        return Redirect::to(&href).into_response();
    }

    let result = match action {
        EditorAction::Edit => run(&state, &form.view, |s| s.begin_edit()),
        EditorAction::Cancel => run(&state, &form.view, |s| s.cancel()),
        EditorAction::Format => {
            let text = form.config.as_deref().map(textarea_text);
            run(&state, &form.view, move |s| {
                if let Some(text) = text {
                    s.update_text(text)?;
                }
                s.format()
            })
        }
        EditorAction::Save => {
            if let Some(text) = form.config.as_deref().map(textarea_text) {
                // Ignored outside Editing; save below reports the mode.
                let _ = run(&state, &form.view, move |s| s.update_text(text));
            }
            state
                .sessions
                .save(&form.view, state.gateway.as_ref())
                .await
                .map(|outcome| debug!("Save outcome for {}: {:?}", form.view, outcome))
        }
        EditorAction::Close => Ok(()),
    };

    match result {
        Ok(()) => {}
        Err(SessionError::Validation(e)) => debug!("Format rejected for agent {}: {}", id, e),
        Err(e) if e.is_ignored() => debug!("{}", e),
        Err(e) => warn!("Config action {:?} for agent {} failed: {}", action, id, e),
    }

    let href = views::detail_href(&id, Tab::Config, Some(&form.view), None);
    Redirect::to(&href).into_response()
}

/// Browsers submit textarea content with CRLF line breaks.
fn textarea_text(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn run(
    state: &DashboardState,
    view: &str,
    f: impl FnOnce(&mut EditSession) -> Result<(), SessionError>,
) -> Result<(), SessionError> {
    state
        .sessions
        .with_session(view, f)
        .unwrap_or(Err(SessionError::Closed))
}

// ============================================================================
// Certificate Rotation
// ============================================================================

#[derive(Debug, Deserialize)]
pub(super) struct RotateForm {
    view: Option<String>,
}

pub(super) async fn rotate_cert_action(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
    Form(form): Form<RotateForm>,
) -> Response {
    let notice = match state.gateway.rotate_client_cert(&id).await {
        Ok(_) => {
            info!("Client certificate rotation requested for agent {}", id);
            Notice::CertRotated
        }
        Err(e) => {
            warn!("Rotating client certificate for agent {} failed: {}", id, e);
            Notice::CertRotateFailed
        }
    };
    let href = views::detail_href(&id, Tab::Details, form.view.as_deref(), Some(notice));
    Redirect::to(&href).into_response()
}
