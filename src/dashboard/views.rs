//! Server-side HTML rendering.

use crate::agents::{Agent, AgentSummary, Attribute};
use crate::sessions::{SessionMode, SessionView};

use std::fmt::Write;
use url::form_urlencoded;

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode one URL path segment.
pub fn path_segment(segment: &str) -> String {
    // byte_serialize only leaves '+' for spaces; literal '+' comes out as %2B.
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

// ============================================================================
// Links
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Details,
    Config,
}

impl Tab {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("config") => Tab::Config,
            _ => Tab::Details,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Tab::Details => "details",
            Tab::Config => "config",
        }
    }
}

/// Notices shown after a redirect. Only these fixed codes are accepted from
/// the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    CertRotated,
    CertRotateFailed,
    SessionExpired,
}

impl Notice {
    pub fn from_query(value: Option<&str>) -> Option<Self> {
        match value? {
            "cert-rotated" => Some(Notice::CertRotated),
            "cert-rotate-failed" => Some(Notice::CertRotateFailed),
            "session-expired" => Some(Notice::SessionExpired),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Notice::CertRotated => "cert-rotated",
            Notice::CertRotateFailed => "cert-rotate-failed",
            Notice::SessionExpired => "session-expired",
        }
    }

    fn render(self) -> &'static str {
        match self {
            Notice::CertRotated => {
                r#"<div class="notice ok">Client certificate rotation requested.</div>"#
            }
            Notice::CertRotateFailed => {
                r#"<div class="notice error">Failed to rotate the client certificate.</div>"#
            }
            Notice::SessionExpired => {
                r#"<div class="notice error">Your edit session expired; the configuration was reloaded.</div>"#
            }
        }
    }
}

pub fn agent_path(agent_id: &str) -> String {
    format!("/agent/{}", path_segment(agent_id))
}

pub fn detail_href(agent_id: &str, tab: Tab, view: Option<&str>, notice: Option<Notice>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("tab", tab.as_str());
    if let Some(view) = view {
        query.append_pair("view", view);
    }
    if let Some(notice) = notice {
        query.append_pair("notice", notice.code());
    }
    format!("{}?{}", agent_path(agent_id), query.finish())
}

// ============================================================================
// Layout
// ============================================================================

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; background: #f9fafb; color: #111827; margin: 0; }
main { max-width: 72rem; margin: 0 auto; padding: 2rem 1rem; }
h1 { font-size: 1.5rem; margin: 0 0 1rem; }
a { color: #2563eb; text-decoration: none; }
a:hover { color: #1d4ed8; }
table { width: 100%; border-collapse: collapse; background: #fff; }
th { background: #f3f4f6; text-align: left; padding: .5rem; }
td { padding: .5rem; border-bottom: 1px solid #e5e7eb; }
.header { display: flex; justify-content: space-between; align-items: center; margin-bottom: 1.5rem; }
.panel { background: #fff; border: 1px solid #e5e7eb; border-radius: .75rem; overflow: hidden; }
.tabs { border-bottom: 1px solid #e5e7eb; padding: 1rem 1.5rem; }
.tabs a { padding: .5rem 1rem; border-radius: .5rem; color: #4b5563; }
.tabs a.active { background: #dbeafe; color: #1d4ed8; }
.content { padding: 1.5rem; }
.card { border: 1px solid #e5e7eb; border-radius: .5rem; margin-bottom: 1.5rem; }
.card h3 { margin: 0; padding: .75rem 1rem; font-size: .875rem; background: #f9fafb; border-bottom: 1px solid #e5e7eb; }
.card .body { padding: 1rem; }
.mono { font-family: ui-monospace, monospace; font-size: .875rem; word-break: break-all; }
.attr { display: flex; margin-bottom: .5rem; }
.attr .key { width: 12rem; font-weight: 600; color: #374151; }
.badge { display: inline-block; padding: .25rem .75rem; border-radius: 9999px; font-size: .875rem; font-weight: 600; }
.badge.up { background: #dcfce7; color: #166534; }
.badge.down { background: #fee2e2; color: #991b1b; }
.notice { padding: .75rem 1rem; border-radius: .5rem; margin-bottom: 1rem; }
.notice.ok { background: #ecfdf5; color: #065f46; border: 1px solid #a7f3d0; }
.notice.error { background: #fef2f2; color: #b91c1c; border: 1px solid #fecaca; }
.editor-bar { display: flex; justify-content: space-between; align-items: center; margin-bottom: 1rem; }
.editor-bar form, .editor-bar .actions { display: inline; }
textarea { width: 100%; height: 500px; font-family: ui-monospace, monospace; font-size: 14px; tab-size: 2; border: 1px solid #e5e7eb; border-radius: .5rem; padding: .5rem; box-sizing: border-box; }
textarea[readonly] { background: #f9fafb; }
button { padding: .5rem 1rem; border-radius: .5rem; border: none; font-weight: 600; cursor: pointer; background: transparent; color: #2563eb; }
button.primary { background: #2563eb; color: #fff; }
button:disabled { opacity: .5; cursor: not-allowed; }
form.inline { display: inline; }
button.link { padding: 0; font-size: 1.25rem; }
"#;

/// Alt+F and Ctrl/Cmd+S both trigger Format while editing.
const EDITOR_SCRIPT: &str = r#"
document.addEventListener('keydown', function (e) {
  var fmt = document.getElementById('format-button');
  if (!fmt || fmt.disabled) return;
  var key = e.key.toLowerCase();
  if ((e.altKey && key === 'f') || ((e.ctrlKey || e.metaKey) && key === 's')) {
    e.preventDefault();
    fmt.click();
  }
});
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n<main>\n{}\n</main>\n</body>\n</html>\n",
        escape(title),
        STYLE,
        body
    )
}

fn back_link() -> &'static str {
    r#"<a href="/">&larr; Back to Agents List</a>"#
}

// ============================================================================
// Agent List
// ============================================================================

pub fn agent_list(agents: &[AgentSummary]) -> String {
    let mut body = String::from("<h1>OpAMP Server</h1>\n<h2>Agents</h2>\n");
    if agents.is_empty() {
        body.push_str("<p>No agents are connected.</p>\n");
        return layout("Agents", &body);
    }

    body.push_str("<table>\n<thead><tr><th>Instance ID</th><th>Status</th></tr></thead>\n<tbody>\n");
    for agent in agents {
        let _ = writeln!(
            body,
            "<tr><td><a class=\"mono\" href=\"{}\">{}</a></td><td>{}</td></tr>",
            escape(&agent_path(&agent.instance_id)),
            escape(&agent.instance_id),
            health_badge(agent.is_up()),
        );
    }
    body.push_str("</tbody>\n</table>\n");
    layout("Agents", &body)
}

pub fn agent_list_error() -> String {
    layout(
        "Agents",
        "<h1>OpAMP Server</h1>\n\
         <div class=\"notice error\">Error loading agents. Please check the server connection.</div>\n\
         <a href=\"/\">Retry</a>",
    )
}

// ============================================================================
// Agent Detail
// ============================================================================

fn health_badge(is_up: bool) -> &'static str {
    if is_up {
        r#"<span class="badge up">Up</span>"#
    } else {
        r#"<span class="badge down">Down</span>"#
    }
}

fn card(title: &str, inner: &str) -> String {
    format!(
        "<div class=\"card\"><h3>{}</h3><div class=\"body\">{}</div></div>\n",
        escape(title),
        inner
    )
}

fn attribute_list(title: &str, attributes: &[Attribute]) -> String {
    if attributes.is_empty() {
        return String::new();
    }
    let mut inner = String::new();
    for attr in attributes {
        let _ = write!(
            inner,
            "<div class=\"attr\"><span class=\"key\">{}:</span><span class=\"mono\">{}</span></div>",
            escape(&attr.key),
            escape(attr.value_str()),
        );
    }
    card(title, &inner)
}

pub struct DetailPage<'a> {
    pub agent: &'a Agent,
    pub session: &'a SessionView,
    pub tab: Tab,
    pub notice: Option<Notice>,
}

impl DetailPage<'_> {
    pub fn render(&self) -> String {
        let agent = self.agent;
        let view = Some(self.session.view_id.as_str());
        let mut body = String::new();

        // Leaving through the back arrow closes the edit session.
        let _ = write!(
            body,
            "<div class=\"header\"><div><form class=\"inline\" method=\"post\" action=\"{}/config/close\">\
             <input type=\"hidden\" name=\"view\" value=\"{}\"><button class=\"link\" type=\"submit\" title=\"Back to Agents List\">&larr;</button></form> \
             <h1 style=\"display:inline\">Agent Details</h1></div>{}</div>\n",
            escape(&agent_path(&agent.instance_id)),
            escape(&self.session.view_id),
            health_badge(agent.is_up()),
        );
        if let Some(notice) = self.notice {
            body.push_str(notice.render());
        }

        let tab_class = |tab: Tab| if tab == self.tab { "active" } else { "" };
        let _ = write!(
            body,
            "<div class=\"panel\">\n<div class=\"tabs\"><a class=\"{}\" href=\"{}\">Details</a> <a class=\"{}\" href=\"{}\">Configuration</a></div>\n<div class=\"content\">\n",
            tab_class(Tab::Details),
            escape(&detail_href(&agent.instance_id, Tab::Details, view, None)),
            tab_class(Tab::Config),
            escape(&detail_href(&agent.instance_id, Tab::Config, view, None)),
        );

        match self.tab {
            Tab::Details => body.push_str(&self.details()),
            Tab::Config => body.push_str(&self.editor()),
        }

        body.push_str("</div>\n</div>\n");
        layout(&format!("Agent {}", agent.instance_id), &body)
    }

    fn details(&self) -> String {
        let agent = self.agent;
        let mut out = card(
            "Instance ID",
            &format!("<p class=\"mono\">{}</p>", escape(&agent.instance_id)),
        );

        out.push_str(&attribute_list(
            "Identifying Attributes",
            agent.identifying_attributes(),
        ));
        out.push_str(&attribute_list(
            "Non-Identifying Attributes",
            agent.non_identifying_attributes(),
        ));

        if let Some(seq) = agent.sequence_num() {
            let mut inner = format!(
                "<div class=\"attr\"><span class=\"key\">Sequence Number:</span><span>{seq}</span></div>"
            );
            if let Some(started) = agent.started_at() {
                let _ = write!(
                    inner,
                    "<div class=\"attr\"><span class=\"key\">Started At:</span><span>{}</span></div>",
                    started.format("%Y-%m-%d %H:%M:%S UTC"),
                );
            }
            out.push_str(&card("Status Details", &inner));
        }

        if let Some(fingerprint) = agent.client_cert() {
            out.push_str(&card(
                "Client Certificate",
                &format!("<p class=\"mono\">{}</p>", escape(fingerprint)),
            ));
        }

        let _ = write!(
            out,
            "<form method=\"post\" action=\"{}/rotate_cert\"><input type=\"hidden\" name=\"view\" value=\"{}\"><button type=\"submit\">Rotate Client Certificate</button></form>\n",
            escape(&agent_path(&agent.instance_id)),
            escape(&self.session.view_id),
        );
        out
    }

    fn editor(&self) -> String {
        let session = self.session;
        let action = |name: &str| {
            escape(&format!(
                "{}/config/{name}",
                agent_path(&self.agent.instance_id)
            ))
        };
        let view_field = format!(
            "<input type=\"hidden\" name=\"view\" value=\"{}\">",
            escape(&session.view_id)
        );
        let mut out = String::new();

        out.push_str("<div class=\"editor-bar\"><h2>Agent Configuration</h2><div class=\"actions\">");
        match session.mode {
            SessionMode::Viewing => {
                let _ = write!(
                    out,
                    "<form method=\"post\" action=\"{}\">{}<button type=\"submit\">Edit Configuration</button></form>",
                    action("edit"),
                    view_field,
                );
            }
            SessionMode::Editing => {
                let _ = write!(
                    out,
                    "<button id=\"format-button\" form=\"config-form\" formaction=\"{}\">Format</button> \
                     <button form=\"config-form\" formaction=\"{}\">Cancel</button> \
                     <button class=\"primary\" form=\"config-form\" formaction=\"{}\">Save Changes</button>",
                    action("format"),
                    action("cancel"),
                    action("save"),
                );
            }
            SessionMode::Saving => {
                out.push_str(
                    "<button disabled>Format</button> <button disabled>Cancel</button> \
                     <button class=\"primary\" disabled>Saving...</button>",
                );
            }
        }
        out.push_str("</div></div>\n");

        if let Some(error) = &session.last_error {
            let _ = writeln!(out, "<div class=\"notice error\">{}</div>", escape(error));
        }

        let readonly = if session.mode == SessionMode::Editing {
            ""
        } else {
            " readonly"
        };
        let _ = write!(
            out,
            "<form id=\"config-form\" method=\"post\" action=\"{}\">{}\
             <textarea name=\"config\" spellcheck=\"false\"{}>{}</textarea></form>\n",
            action("save"),
            view_field,
            readonly,
            escape(&session.text),
        );

        if session.mode == SessionMode::Editing {
            let _ = write!(out, "<script>{EDITOR_SCRIPT}</script>\n");
        }
        out
    }
}

pub fn agent_not_found(agent_id: &str) -> String {
    let body = format!(
        "<h1>Agent Not Found</h1>\n<div class=\"notice error\">No agent with instance ID <span class=\"mono\">{}</span> is known to the server.</div>\n{}",
        escape(agent_id),
        back_link(),
    );
    layout("Agent Not Found", &body)
}

pub fn agent_detail_error() -> String {
    let body = format!(
        "<h1>Agent Details</h1>\n<div class=\"notice error\">Error loading agent details. Please check the server connection.</div>\n{}",
        back_link(),
    );
    layout("Agent Details", &body)
}
