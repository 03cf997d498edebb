//! Integration tests for the dashboard pages and JSON API.
//!
//! Each test starts the real router on an ephemeral port, backed by a
//! wiremock server standing in for the agent registry, and drives it with
//! plain HTTP requests the way a browser would.

use pretty_assertions::assert_eq;
use reqwest::{header::LOCATION, redirect::Policy, Client, StatusCode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opamp_dashboard::agents::HttpAgentGateway;
use opamp_dashboard::config::SaveEncoding;
use opamp_dashboard::dashboard::{routes, DashboardState};
use opamp_dashboard::sessions::SessionStore;

const AGENT_ID: &str = "agent-1";

struct Harness {
    base: String,
    client: Client,
    backend: MockServer,
}

impl Harness {
    async fn start() -> Self {
        let backend = MockServer::start().await;
        let gateway = HttpAgentGateway::new(
            Url::parse(&backend.uri()).unwrap(),
            Duration::from_secs(2),
            SaveEncoding::Form,
        )
        .unwrap();
        let state = DashboardState::new(
            Arc::new(gateway),
            SessionStore::with_limits(Duration::from_secs(600), 16),
        );
        let app = routes::build_routes(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = Client::builder().redirect(Policy::none()).build().unwrap();
        Self {
            base: format!("http://{addr}"),
            client,
            backend,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, String) {
        let response = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    /// Post a form and return the redirect target.
    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> String {
        let response = self
            .client
            .post(format!("{}{}", self.base, path))
            .form(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "POST {path}");
        response
            .headers()
            .get(LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn mount_agent(&self, effective_config: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/api/agent/{AGENT_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(agent_json(
                AGENT_ID,
                true,
                effective_config,
            )))
            .mount(&self.backend)
            .await;
    }
}

fn agent_json(id: &str, healthy: bool, effective_config: &str) -> serde_json::Value {
    json!({
        "InstanceIdStr": id,
        "Status": {
            "sequence_num": 3,
            "agent_description": {
                "identifying_attributes": [
                    {"key": "service.name", "value": {"Value": {"StringValue": "otelcol-contrib"}}}
                ],
                "non_identifying_attributes": [
                    {"key": "host.name", "value": {"Value": {"StringValue": "edge-01"}}}
                ]
            },
            "health": {"healthy": healthy}
        },
        "EffectiveConfig": effective_config,
        "StartedAt": "2024-05-01T10:00:00Z",
        "ClientCertSha256Fingerprint": "9f:86:d0:81"
    })
}

/// Pull the edit session id out of a rendered detail page.
fn view_id(html: &str) -> String {
    let marker = "name=\"view\" value=\"";
    let start = html.find(marker).expect("page carries a view id") + marker.len();
    let end = html[start..].find('"').unwrap() + start;
    html[start..end].to_string()
}

fn config_href(view: &str) -> String {
    format!("/agent/{AGENT_ID}?tab=config&view={view}")
}

// ============================================================================
// Agent List
// ============================================================================

#[tokio::test]
async fn agent_list_links_each_agent() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            agent_json("b-agent", false, ""),
            agent_json("a-agent", true, ""),
        ])))
        .mount(&h.backend)
        .await;

    let (status, html) = h.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("href=\"/agent/a-agent\""));
    assert!(html.contains("href=\"/agent/b-agent\""));
    assert!(html.find("a-agent").unwrap() < html.find("b-agent").unwrap());
    assert!(html.contains("badge up"));
    assert!(html.contains("badge down"));
}

#[tokio::test]
async fn agent_list_backend_failure_renders_error() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agents"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.backend)
        .await;

    let (status, html) = h.get("/").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(html.contains("Error loading agents"));
}

// ============================================================================
// Agent Detail
// ============================================================================

#[tokio::test]
async fn detail_page_shows_status_and_attributes() {
    let h = Harness::start().await;
    h.mount_agent("receivers:\n  otlp: {}\n").await;

    let (status, html) = h.get(&format!("/agent/{AGENT_ID}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("badge up"));
    assert!(html.contains(AGENT_ID));
    assert!(html.contains("otelcol-contrib"));
    assert!(html.contains("edge-01"));
    assert!(html.contains("9f:86:d0:81"));
    assert!(html.contains("Rotate Client Certificate"));
}

#[tokio::test]
async fn unknown_agent_renders_not_found_page() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agent/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&h.backend)
        .await;

    let (status, html) = h.get("/agent/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(html.contains("Agent Not Found"));
    assert!(html.contains("href=\"/\""));
}

#[tokio::test]
async fn detail_backend_failure_renders_error_page() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/agent/{AGENT_ID}")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.backend)
        .await;

    let (status, html) = h.get(&format!("/agent/{AGENT_ID}")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(html.contains("Error loading agent details"));
    assert!(html.contains("href=\"/\""));
}

// ============================================================================
// Configuration Editor
// ============================================================================

#[tokio::test]
async fn edit_format_save_flow() {
    let h = Harness::start().await;
    h.mount_agent("a: 1\n").await;
    Mock::given(method("POST"))
        .and(path("/api/save_config"))
        .and(body_string_contains("instanceid=agent-1"))
        .and(body_string_contains("config=a%3A+1%0Ab%3A+2%0A"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.backend)
        .await;

    let (_, html) = h.get(&format!("/agent/{AGENT_ID}?tab=config")).await;
    assert!(html.contains("Edit Configuration"));
    assert!(html.contains(" readonly>a: 1\n</textarea>"));
    let view = view_id(&html);
    let actions = format!("/agent/{AGENT_ID}/config");

    let location = h.post_form(&format!("{actions}/edit"), &[("view", view.as_str())]).await;
    assert_eq!(location, config_href(&view));
    let (_, html) = h.get(&location).await;
    assert!(html.contains("Save Changes"));
    assert!(!html.contains("readonly>"));

    h.post_form(
        &format!("{actions}/format"),
        &[("view", view.as_str()), ("config", "a:   1\nb:    2\n")],
    )
    .await;
    let (_, html) = h.get(&config_href(&view)).await;
    assert!(html.contains(">a: 1\nb: 2\n</textarea>"));

    h.post_form(
        &format!("{actions}/save"),
        &[("view", view.as_str()), ("config", "a: 1\nb: 2\n")],
    )
    .await;
    let (_, html) = h.get(&config_href(&view)).await;
    assert!(html.contains("Edit Configuration"));
    assert!(html.contains(" readonly>a: 1\nb: 2\n</textarea>"));
}

#[tokio::test]
async fn format_failure_keeps_text_and_shows_error() {
    let h = Harness::start().await;
    h.mount_agent("a: 1\n").await;

    let (_, html) = h.get(&format!("/agent/{AGENT_ID}?tab=config")).await;
    let view = view_id(&html);
    let actions = format!("/agent/{AGENT_ID}/config");
    h.post_form(&format!("{actions}/edit"), &[("view", view.as_str())]).await;

    h.post_form(
        &format!("{actions}/format"),
        &[("view", view.as_str()), ("config", "a: [1,2")],
    )
    .await;
    let (_, html) = h.get(&config_href(&view)).await;
    assert!(html.contains("invalid YAML"));
    assert!(html.contains(">a: [1,2</textarea>"));
    assert!(html.contains("Save Changes"));
}

#[tokio::test]
async fn cancel_restores_original_config() {
    let h = Harness::start().await;
    h.mount_agent("a: 1\n").await;

    let (_, html) = h.get(&format!("/agent/{AGENT_ID}?tab=config")).await;
    let view = view_id(&html);
    let actions = format!("/agent/{AGENT_ID}/config");
    h.post_form(&format!("{actions}/edit"), &[("view", view.as_str())]).await;
    h.post_form(
        &format!("{actions}/format"),
        &[("view", view.as_str()), ("config", "b: 2\n")],
    )
    .await;

    h.post_form(&format!("{actions}/cancel"), &[("view", view.as_str())]).await;
    let (_, html) = h.get(&config_href(&view)).await;
    assert!(html.contains(" readonly>a: 1\n</textarea>"));
}

#[tokio::test]
async fn failed_save_returns_to_editing_with_message() {
    let h = Harness::start().await;
    h.mount_agent("a: 1\n").await;
    Mock::given(method("POST"))
        .and(path("/api/save_config"))
        .respond_with(ResponseTemplate::new(500).set_body_string("registry unavailable"))
        .mount(&h.backend)
        .await;

    let (_, html) = h.get(&format!("/agent/{AGENT_ID}?tab=config")).await;
    let view = view_id(&html);
    let actions = format!("/agent/{AGENT_ID}/config");
    h.post_form(&format!("{actions}/edit"), &[("view", view.as_str())]).await;
    h.post_form(
        &format!("{actions}/save"),
        &[("view", view.as_str()), ("config", "a: 2\n")],
    )
    .await;

    let (_, html) = h.get(&config_href(&view)).await;
    assert!(html.contains("Failed to save configuration"));
    assert!(html.contains("registry unavailable"));
    assert!(html.contains("Save Changes"));
    assert!(html.contains(">a: 2\n</textarea>"));
}

#[tokio::test]
async fn unknown_session_redirects_with_notice() {
    let h = Harness::start().await;

    let location = h
        .post_form(
            &format!("/agent/{AGENT_ID}/config/edit"),
            &[("view", "no-such-view")],
        )
        .await;
    assert_eq!(
        location,
        format!("/agent/{AGENT_ID}?tab=config&notice=session-expired")
    );
}

#[tokio::test]
async fn close_drops_session_and_returns_to_list() {
    let h = Harness::start().await;
    h.mount_agent("a: 1\n").await;

    let (_, html) = h.get(&format!("/agent/{AGENT_ID}?tab=config")).await;
    let view = view_id(&html);

    let location = h
        .post_form(&format!("/agent/{AGENT_ID}/config/close"), &[("view", view.as_str())])
        .await;
    assert_eq!(location, "/");

    // A closed view is replaced by a fresh session on the next visit.
    let (_, html) = h.get(&config_href(&view)).await;
    assert_ne!(view_id(&html), view);
}

#[tokio::test]
async fn rotate_cert_redirects_with_notice() {
    let h = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rotate_client_cert"))
        .and(body_string_contains("instanceid=agent-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.backend)
        .await;

    let location = h
        .post_form(&format!("/agent/{AGENT_ID}/rotate_cert"), &[("view", "v1")])
        .await;
    assert_eq!(
        location,
        format!("/agent/{AGENT_ID}?tab=details&view=v1&notice=cert-rotated")
    );
}

// ============================================================================
// JSON API
// ============================================================================

#[tokio::test]
async fn api_health_reports_ok() {
    let h = Harness::start().await;
    let body: serde_json::Value = h
        .client
        .get(format!("{}/api/health", h.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn api_agent_proxies_and_maps_errors() {
    let h = Harness::start().await;
    h.mount_agent("a: 1\n").await;
    Mock::given(method("GET"))
        .and(path("/api/agent/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/agents"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.backend)
        .await;

    let response = h
        .client
        .get(format!("{}/api/agent/{AGENT_ID}", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let agent: serde_json::Value = response.json().await.unwrap();
    assert_eq!(agent["InstanceIdStr"], AGENT_ID);
    assert_eq!(agent["EffectiveConfig"], "a: 1\n");

    let (status, body) = h.get("/api/agent/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");

    let response = h
        .client
        .get(format!("{}/api/agents", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "Failed to fetch agents"}));
}

#[tokio::test]
async fn api_save_rejects_invalid_yaml_before_backend() {
    let h = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/api/save_config"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.backend)
        .await;

    let response = h
        .client
        .post(format!("{}/api/agent/{AGENT_ID}", h.base))
        .json(&json!({"config": "a: [1,2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn api_save_failure_is_500() {
    let h = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/api/save_config"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.backend)
        .await;

    let response = h
        .client
        .post(format!("{}/api/agent/{AGENT_ID}", h.base))
        .json(&json!({"config": "a: 1\n"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "Failed to update agent configuration"})
    );
}

#[tokio::test]
async fn api_format_canonicalises_yaml() {
    let h = Harness::start().await;

    let response = h
        .client
        .post(format!("{}/api/format", h.base))
        .json(&json!({"config": "a:   1\nb:    2\n"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"formatted": "a: 1\nb: 2\n"}));

    let response = h
        .client
        .post(format!("{}/api/format", h.base))
        .json(&json!({"config": "a: [1,2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
