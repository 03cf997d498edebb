//! Configuration edit sessions.
//!
//! An [`EditSession`] drives the view -> edit -> save workflow for one agent.
//! The [`SessionStore`] keeps one session per open detail view so that the
//! form posts of a browser tab land on the same session.

use crate::agents::{Ack, AgentGateway, GatewayError};
use crate::config::SessionsConfig;
use crate::document::{ConfigDocument, DocumentError};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// Modes, Actions, Errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Viewing,
    Editing,
    /// A save request is in flight; nothing may mutate the document.
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Edit,
    Update,
    Format,
    Cancel,
    Save,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The text does not parse. Local only, never reaches the backend.
    #[error(transparent)]
    Validation(#[from] DocumentError),
    #[error("Failed to save configuration: {0}")]
    Save(GatewayError),
    #[error("{action:?} is not available while {mode:?}")]
    Ignored {
        action: SessionAction,
        mode: SessionMode,
    },
    #[error("save response for a superseded request was discarded")]
    Stale,
    #[error("edit session is no longer open")]
    Closed,
}

impl SessionError {
    pub fn is_ignored(&self) -> bool {
        matches!(self, SessionError::Ignored { .. })
    }
}

// ============================================================================
// EditSession
// ============================================================================

/// Everything the backend needs to persist one save, taken out of the
/// session so the request can run without holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub agent_id: String,
    pub config: String,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    agent_id: String,
    document: ConfigDocument,
    /// Text restored by Cancel; replaced by each successful save.
    baseline: String,
    mode: SessionMode,
    last_error: Option<String>,
    generation: u64,
}

impl EditSession {
    pub fn new(agent_id: impl Into<String>, effective_config: impl Into<String>) -> Self {
        let baseline = effective_config.into();
        Self {
            agent_id: agent_id.into(),
            document: ConfigDocument::new(baseline.clone()),
            baseline,
            mode: SessionMode::Viewing,
            last_error: None,
            generation: 0,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn text(&self) -> &str {
        self.document.raw_text()
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.document.raw_text() != self.baseline
    }

    fn require(&self, action: SessionAction, mode: SessionMode) -> Result<(), SessionError> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(SessionError::Ignored {
                action,
                mode: self.mode,
            })
        }
    }

    /// Viewing -> Editing.
    pub fn begin_edit(&mut self) -> Result<(), SessionError> {
        self.require(SessionAction::Edit, SessionMode::Viewing)?;
        self.mode = SessionMode::Editing;
        Ok(())
    }

    /// Replace the text with the user's edit.
    pub fn update_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.require(SessionAction::Update, SessionMode::Editing)?;
        let text = text.into();
        if text != self.document.raw_text() {
            // A message about the old text no longer applies.
            self.last_error = None;
            self.document.set_text(text);
        }
        Ok(())
    }

    /// Canonicalize the text. A parse failure leaves the text untouched and
    /// becomes the session's `last_error`.
    pub fn format(&mut self) -> Result<(), SessionError> {
        self.require(SessionAction::Format, SessionMode::Editing)?;
        match self.document.format_in_place() {
            Ok(()) => {
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(SessionError::Validation(e))
            }
        }
    }

    /// Editing -> Viewing, discarding every edit.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.require(SessionAction::Cancel, SessionMode::Editing)?;
        self.document = ConfigDocument::new(self.baseline.clone());
        self.last_error = None;
        self.mode = SessionMode::Viewing;
        Ok(())
    }

    /// Editing -> Saving. At most one ticket is outstanding at a time.
    pub fn begin_save(&mut self) -> Result<SaveTicket, SessionError> {
        self.require(SessionAction::Save, SessionMode::Editing)?;
        self.generation += 1;
        self.mode = SessionMode::Saving;
        Ok(SaveTicket {
            agent_id: self.agent_id.clone(),
            config: self.document.raw_text().to_string(),
            generation: self.generation,
        })
    }

    /// Apply the backend's answer to an outstanding ticket.
    ///
    /// Success makes the submitted text the new baseline and returns to
    /// Viewing; failure returns to Editing with the edits intact.
    pub fn finish_save(
        &mut self,
        ticket: &SaveTicket,
        result: Result<Ack, GatewayError>,
    ) -> Result<(), SessionError> {
        if self.mode != SessionMode::Saving || ticket.generation != self.generation {
            return Err(SessionError::Stale);
        }

        match result {
            Ok(ack) => {
                debug!(
                    "Config for agent {} saved (status {})",
                    self.agent_id, ack.status
                );
                self.baseline = ticket.config.clone();
                self.last_error = None;
                self.mode = SessionMode::Viewing;
                Ok(())
            }
            Err(e) => {
                let err = SessionError::Save(e);
                self.last_error = Some(err.to_string());
                self.mode = SessionMode::Editing;
                Err(err)
            }
        }
    }

    /// Saving -> Editing for a ticket whose request will never be answered.
    /// The edits are kept; a later answer for the ticket is stale.
    fn abandon_save(&mut self, ticket: &SaveTicket) {
        if self.mode == SessionMode::Saving && ticket.generation == self.generation {
            self.generation += 1;
            self.last_error = Some(SAVE_INTERRUPTED.to_string());
            self.mode = SessionMode::Editing;
        }
    }

    /// Save through `gateway` when this session has a single owner.
    pub async fn save(&mut self, gateway: &dyn AgentGateway) -> Result<(), SessionError> {
        let ticket = self.begin_save()?;
        let pending = PendingSave::new(SessionRef::Owned(self), ticket);
        let result = gateway
            .save_config(&pending.ticket.agent_id, &pending.ticket.config)
            .await;
        pending.finish(result)
    }
}

const SAVE_INTERRUPTED: &str =
    "Save was interrupted before the backend answered; the configuration may not have been applied";

enum SessionRef<'a> {
    Owned(&'a mut EditSession),
    Shared(&'a Mutex<EditSession>),
}

/// An issued save ticket. Dropping it unfinished (the request future was
/// cancelled) returns the session to Editing so it never stays in Saving
/// without a request in flight.
struct PendingSave<'a> {
    session: SessionRef<'a>,
    ticket: SaveTicket,
    settled: bool,
}

impl<'a> PendingSave<'a> {
    fn new(session: SessionRef<'a>, ticket: SaveTicket) -> Self {
        Self {
            session,
            ticket,
            settled: false,
        }
    }

    fn with<R>(&mut self, f: impl FnOnce(&mut EditSession, &SaveTicket) -> R) -> R {
        match &mut self.session {
            SessionRef::Owned(session) => f(session, &self.ticket),
            SessionRef::Shared(session) => f(&mut session.lock(), &self.ticket),
        }
    }

    fn finish(mut self, result: Result<Ack, GatewayError>) -> Result<(), SessionError> {
        self.settled = true;
        self.with(|session, ticket| session.finish_save(ticket, result))
    }

    /// Give up on the ticket without touching the session.
    fn forget(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingSave<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                "Save for agent {} was cancelled before the backend answered",
                self.ticket.agent_id
            );
            self.with(|session, ticket| session.abandon_save(ticket));
        }
    }
}

// ============================================================================
// Session Store
// ============================================================================

/// Render-ready copy of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub view_id: String,
    pub agent_id: String,
    pub mode: SessionMode,
    pub text: String,
    pub last_error: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The backend accepted the text and the session moved back to Viewing.
    Saved,
    /// The view was closed while the request was in flight; the response
    /// was not applied to anything.
    Discarded,
}

#[derive(Clone)]
struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    session: Mutex<EditSession>,
    touched: Mutex<Instant>,
}

impl SessionHandle {
    fn new(session: EditSession) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session: Mutex::new(session),
                touched: Mutex::new(Instant::now()),
            }),
        }
    }

    fn touch(&self) {
        *self.inner.touched.lock() = Instant::now();
    }

    fn touched(&self) -> Instant {
        *self.inner.touched.lock()
    }

    fn same_as(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Open edit sessions, keyed by view id.
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(config: &SessionsConfig) -> Self {
        Self::with_limits(
            Duration::from_secs(config.idle_ttl_secs),
            config.max_sessions,
        )
    }

    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Start a session for a freshly loaded agent and return its view id.
    pub fn open(&self, agent_id: &str, effective_config: &str) -> String {
        self.prune_idle();
        while self.sessions.len() >= self.max_sessions {
            if !self.evict_oldest() {
                break;
            }
        }

        let view_id = Uuid::new_v4().to_string();
        let handle = SessionHandle::new(EditSession::new(agent_id, effective_config));
        self.sessions.insert(view_id.clone(), handle);
        debug!("Opened edit session {} for agent {}", view_id, agent_id);
        view_id
    }

    fn handle(&self, view_id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.get(view_id).map(|entry| entry.value().clone())?;
        handle.touch();
        Some(handle)
    }

    pub fn contains(&self, view_id: &str) -> bool {
        self.sessions.contains_key(view_id)
    }

    /// Snapshot a session for rendering.
    pub fn view(&self, view_id: &str) -> Option<SessionView> {
        let handle = self.handle(view_id)?;
        let session = handle.inner.session.lock();
        Some(SessionView {
            view_id: view_id.to_string(),
            agent_id: session.agent_id().to_string(),
            mode: session.mode(),
            text: session.text().to_string(),
            last_error: session.last_error().map(str::to_string),
            dirty: session.is_dirty(),
        })
    }

    /// Run a synchronous action against a session.
    pub fn with_session<R>(
        &self,
        view_id: &str,
        f: impl FnOnce(&mut EditSession) -> R,
    ) -> Option<R> {
        let handle = self.handle(view_id)?;
        let mut session = handle.inner.session.lock();
        Some(f(&mut session))
    }

    /// Drop a session. A save still in flight for it will be discarded.
    pub fn close(&self, view_id: &str) -> bool {
        let removed = self.sessions.remove(view_id).is_some();
        if removed {
            debug!("Closed edit session {}", view_id);
        }
        removed
    }

    /// Submit the session's text. The session lock is only held to take the
    /// ticket and to apply the result, never across the backend call.
    pub async fn save(
        &self,
        view_id: &str,
        gateway: &dyn AgentGateway,
    ) -> Result<SaveOutcome, SessionError> {
        let handle = self.handle(view_id).ok_or(SessionError::Closed)?;
        let ticket = handle.inner.session.lock().begin_save()?;
        let agent_id = ticket.agent_id.clone();
        let pending = PendingSave::new(SessionRef::Shared(&handle.inner.session), ticket);

        info!("Saving configuration for agent {}", agent_id);
        let result = gateway
            .save_config(&pending.ticket.agent_id, &pending.ticket.config)
            .await;

        let still_open = self
            .sessions
            .get(view_id)
            .map(|entry| entry.value().same_as(&handle))
            .unwrap_or(false);
        if !still_open {
            debug!(
                "Discarding save response for closed session {} (agent {})",
                view_id, agent_id
            );
            pending.forget();
            return Ok(SaveOutcome::Discarded);
        }

        let outcome = pending.finish(result);
        if let Err(ref e) = outcome {
            warn!("Save for agent {} failed: {}", agent_id, e);
        }
        outcome.map(|()| SaveOutcome::Saved)
    }

    /// Drop sessions idle for longer than the configured TTL.
    pub fn prune_idle(&self) -> usize {
        self.prune_idle_at(Instant::now())
    }

    fn prune_idle_at(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        let ttl = self.idle_ttl;
        self.sessions
            .retain(|_, handle| now.saturating_duration_since(handle.touched()) < ttl);
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            debug!("Pruned {} idle edit sessions", pruned);
        }
        pruned
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().touched())
            .map(|entry| entry.key().clone());
        match oldest {
            Some(view_id) => {
                debug!("Evicting least recently used edit session {}", view_id);
                self.sessions.remove(&view_id).is_some()
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
