//! Access to the agent registry backend.
//!
//! The dashboard owns no agent state. Everything shown or edited goes through
//! an [`AgentGateway`]; [`HttpAgentGateway`] is the production implementation.

mod http;
mod types;

pub use http::*;
pub use types::*;

use async_trait::async_trait;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("agent {0} not found")]
    NotFound(String),
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend rejected the request with status {status}{}", detail(.message))]
    Rejected { status: u16, message: Option<String> },
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }

    /// Backend-supplied detail, when the failure carried one.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            GatewayError::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// Gateway Trait
// ============================================================================

#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<AgentSummary>, GatewayError>;
    async fn get_agent(&self, agent_id: &str) -> Result<Agent, GatewayError>;
    async fn save_config(&self, agent_id: &str, config: &str) -> Result<Ack, GatewayError>;
    async fn rotate_client_cert(&self, agent_id: &str) -> Result<Ack, GatewayError>;
}
