use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Agent Description
// ============================================================================

/// One key/value pair of an agent description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    #[serde(default)]
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue {
                value: Some(StringPayload {
                    string_value: Some(value.into()),
                }),
            },
        }
    }

    /// The string payload, or an empty string for non-string kinds.
    pub fn value_str(&self) -> &str {
        self.value
            .value
            .as_ref()
            .and_then(|v| v.string_value.as_deref())
            .unwrap_or_default()
    }
}

/// Wrapper shape used by the backend: `{"Value": {"StringValue": "..."}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeValue {
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<StringPayload>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StringPayload {
    #[serde(rename = "StringValue", default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentDescription {
    #[serde(default)]
    pub identifying_attributes: Vec<Attribute>,
    #[serde(default)]
    pub non_identifying_attributes: Vec<Attribute>,
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentHealth {
    #[serde(default, alias = "Up", alias = "up")]
    pub healthy: Option<bool>,
    #[serde(default, alias = "LastError", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentStatus {
    #[serde(default)]
    pub sequence_num: u64,
    #[serde(default)]
    pub agent_description: Option<AgentDescription>,
    #[serde(default, alias = "Health", skip_serializing_if = "Option::is_none")]
    pub health: Option<AgentHealth>,
}

// ============================================================================
// Agent
// ============================================================================

/// Full agent record as returned by `GET /api/agent/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(rename = "InstanceIdStr")]
    pub instance_id: String,
    #[serde(rename = "Status", default)]
    pub status: Option<AgentStatus>,
    #[serde(rename = "EffectiveConfig", default)]
    pub effective_config: String,
    #[serde(rename = "StartedAt", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(rename = "ClientCertSha256Fingerprint", default)]
    pub client_cert_fingerprint: String,
}

impl Agent {
    pub fn is_up(&self) -> bool {
        is_up(self.status.as_ref())
    }

    pub fn sequence_num(&self) -> Option<u64> {
        self.status.as_ref().map(|s| s.sequence_num)
    }

    pub fn description(&self) -> Option<&AgentDescription> {
        self.status.as_ref().and_then(|s| s.agent_description.as_ref())
    }

    pub fn identifying_attributes(&self) -> &[Attribute] {
        self.description()
            .map(|d| d.identifying_attributes.as_slice())
            .unwrap_or_default()
    }

    pub fn non_identifying_attributes(&self) -> &[Attribute] {
        self.description()
            .map(|d| d.non_identifying_attributes.as_slice())
            .unwrap_or_default()
    }

    /// Fingerprint of the agent's client certificate, if it presented one.
    pub fn client_cert(&self) -> Option<&str> {
        let fp = self.client_cert_fingerprint.trim();
        (!fp.is_empty()).then_some(fp)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Entry of the agent list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    #[serde(rename = "InstanceIdStr")]
    pub instance_id: String,
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
}

impl AgentSummary {
    pub fn is_up(&self) -> bool {
        is_up(self.status.as_ref())
    }
}

impl From<&Agent> for AgentSummary {
    fn from(agent: &Agent) -> Self {
        Self {
            instance_id: agent.instance_id.clone(),
            status: agent.status.clone(),
        }
    }
}

fn is_up(status: Option<&AgentStatus>) -> bool {
    status
        .and_then(|s| s.health.as_ref())
        .and_then(|h| h.healthy)
        .unwrap_or(false)
}

/// The backend has served the agent list both as an array and as an object
/// keyed by instance id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AgentListPayload {
    List(Vec<AgentSummary>),
    Map(BTreeMap<String, AgentSummary>),
}

impl AgentListPayload {
    /// Flatten into a list ordered by instance id.
    pub(crate) fn into_sorted(self) -> Vec<AgentSummary> {
        let mut agents = match self {
            AgentListPayload::List(list) => list,
            AgentListPayload::Map(map) => map.into_values().collect(),
        };
        agents.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        agents
    }
}

/// Acknowledgement of a write accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: u16,
}
