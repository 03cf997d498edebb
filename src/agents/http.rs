use super::types::AgentListPayload;
use super::*;
use crate::config::{BackendConfig, SaveEncoding};

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Longest backend error body surfaced to the operator.
const MAX_BACKEND_MESSAGE_CHARS: usize = 512;

/// Agent gateway talking to the registry backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAgentGateway {
    base_url: Url,
    save_encoding: SaveEncoding,
    client: Client,
}

#[derive(Serialize)]
struct ConfigBody<'a> {
    config: &'a str,
}

impl HttpAgentGateway {
    pub fn new(
        base_url: Url,
        timeout: Duration,
        save_encoding: SaveEncoding,
    ) -> Result<Self, GatewayError> {
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Transport(format!(
                "backend URL '{base_url}' cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            base_url,
            save_encoding,
            client,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GatewayError::Transport(format!("invalid backend URL '{}': {e}", config.base_url))
        })?;
        Self::new(
            base_url,
            Duration::from_secs(config.timeout_secs),
            config.save_encoding,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/seg/seg/...`, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Hit the backend health endpoint.
    pub async fn ping(&self) -> Result<(), GatewayError> {
        let url = self.endpoint(&["api", "health"]);
        let response = self.client.get(url).send().await.map_err(transport)?;
        check_status(response).await.map(|_| ())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport)?;
        let response = check_status(response).await?;
        decode(response).await
    }

    async fn post_form(&self, url: Url, form: &[(&str, &str)]) -> Result<Ack, GatewayError> {
        debug!("POST {} (form)", url);
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;
        Ok(Ack {
            status: response.status().as_u16(),
        })
    }
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    async fn list_agents(&self) -> Result<Vec<AgentSummary>, GatewayError> {
        let url = self.endpoint(&["api", "agents"]);
        let payload: AgentListPayload = self.get_json(url).await?;
        Ok(payload.into_sorted())
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Agent, GatewayError> {
        let url = self.endpoint(&["api", "agent", agent_id]);
        self.get_json(url).await.map_err(|e| match e {
            GatewayError::Rejected { status: 404, .. } => GatewayError::NotFound(agent_id.to_string()),
            other => other,
        })
    }

    async fn save_config(&self, agent_id: &str, config: &str) -> Result<Ack, GatewayError> {
        let result = match self.save_encoding {
            SaveEncoding::Form => {
                let url = self.endpoint(&["api", "save_config"]);
                self.post_form(url, &[("instanceid", agent_id), ("config", config)])
                    .await
            }
            SaveEncoding::Json => {
                let url = self.endpoint(&["api", "agent", agent_id, "config"]);
                debug!("POST {} (json)", url);
                let response = self
                    .client
                    .post(url)
                    .json(&ConfigBody { config })
                    .send()
                    .await
                    .map_err(transport)?;
                check_status(response).await.map(|r| Ack {
                    status: r.status().as_u16(),
                })
            }
        };

        match result {
            Err(GatewayError::Rejected { status: 404, .. }) => {
                Err(GatewayError::NotFound(agent_id.to_string()))
            }
            Err(e) => {
                warn!("Saving config for agent {} failed: {}", agent_id, e);
                Err(e)
            }
            ok => ok,
        }
    }

    async fn rotate_client_cert(&self, agent_id: &str) -> Result<Ack, GatewayError> {
        let url = self.endpoint(&["api", "rotate_client_cert"]);
        self.post_form(url, &[("instanceid", agent_id)])
            .await
            .map_err(|e| match e {
                GatewayError::Rejected { status: 404, .. } => {
                    GatewayError::NotFound(agent_id.to_string())
                }
                other => other,
            })
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn transport(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Transport("request timed out".to_string())
    } else {
        GatewayError::Transport(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Rejected {
        status: status.as_u16(),
        message: backend_message(status, &body),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Pull a human-readable message out of an error body: JSON `{"error": ...}`
/// or the trimmed text itself.
fn backend_message(status: StatusCode, body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(msg) = value.get("error").and_then(|e| e.as_str()) {
            return Some(msg.to_string());
        }
    }
    // Bare reason phrases ("Not Found") add nothing to the status code.
    if status.canonical_reason() == Some(trimmed) {
        return None;
    }
    Some(trimmed.chars().take(MAX_BACKEND_MESSAGE_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(base: &str) -> HttpAgentGateway {
        HttpAgentGateway::new(
            Url::parse(base).unwrap(),
            Duration::from_secs(5),
            SaveEncoding::Form,
        )
        .unwrap()
    }

    #[test]
    fn endpoint_joins_segments() {
        let gw = gateway("http://localhost:4321");
        assert_eq!(
            gw.endpoint(&["api", "agents"]).as_str(),
            "http://localhost:4321/api/agents"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let gw = gateway("http://backend.internal/opamp/");
        assert_eq!(
            gw.endpoint(&["api", "agent", "abc"]).as_str(),
            "http://backend.internal/opamp/api/agent/abc"
        );
    }

    #[test]
    fn endpoint_escapes_agent_id() {
        let gw = gateway("http://localhost:4321");
        let url = gw.endpoint(&["api", "agent", "a/b?c"]);
        assert_eq!(url.as_str(), "http://localhost:4321/api/agent/a%2Fb%3Fc");
    }

    #[test]
    fn backend_message_prefers_json_error() {
        assert_eq!(
            backend_message(StatusCode::BAD_REQUEST, r#"{"error":"config rejected"}"#),
            Some("config rejected".to_string())
        );
        assert_eq!(
            backend_message(StatusCode::BAD_REQUEST, "  plain text \n"),
            Some("plain text".to_string())
        );
        assert_eq!(backend_message(StatusCode::BAD_GATEWAY, ""), None);
        assert_eq!(backend_message(StatusCode::NOT_FOUND, "Not Found"), None);
    }

    #[test]
    fn rejects_non_base_url() {
        let url = Url::parse("mailto:ops@example.com").unwrap();
        assert!(HttpAgentGateway::new(url, Duration::from_secs(1), SaveEncoding::Form).is_err());
    }
}
