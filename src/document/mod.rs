//! YAML configuration documents as held by the editor.
//!
//! Formatting is defined as parse-then-serialize: the canonical text is
//! whatever the YAML emitter produces for the parsed value (two-space
//! indentation, block style, no line-width limit), so incidental whitespace
//! in the source never survives a format.

use serde_yaml::Value;
use std::fmt;

// ============================================================================
// Errors
// ============================================================================

/// Raised when configuration text is not a valid YAML document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid YAML: {message}")]
    Parse {
        message: String,
        /// 1-based line of the offending token, when the parser reports one.
        line: Option<usize>,
        column: Option<usize>,
    },
}

impl DocumentError {
    pub fn message(&self) -> &str {
        match self {
            DocumentError::Parse { message, .. } => message,
        }
    }

    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            DocumentError::Parse {
                line: Some(line),
                column: Some(column),
                ..
            } => Some((*line, *column)),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for DocumentError {
    fn from(err: serde_yaml::Error) -> Self {
        let location = err.location();
        DocumentError::Parse {
            message: err.to_string(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    }
}

// ============================================================================
// Parse / Format
// ============================================================================

/// Decode `raw_text` as a single YAML document.
///
/// Documents the emitter cannot write back (a mapping used as a mapping key)
/// are rejected here, so [`format`] succeeds for every text `parse` accepts.
pub fn parse(raw_text: &str) -> Result<Value, DocumentError> {
    decode(raw_text).map(|(value, _)| value)
}

/// Re-serialize `raw_text` in canonical style.
///
/// Fails with the same error as [`parse`] when the input does not parse.
pub fn format(raw_text: &str) -> Result<String, DocumentError> {
    decode(raw_text).map(|(_, canonical)| canonical)
}

/// Parse and emit in one pass: the canonical text is the proof that the
/// value can be written back.
fn decode(raw_text: &str) -> Result<(Value, String), DocumentError> {
    let value = serde_yaml::from_str::<Value>(raw_text)?;
    let canonical = serde_yaml::to_string(&value).map_err(|e| DocumentError::Parse {
        message: format!("unsupported YAML structure: {e}"),
        line: None,
        column: None,
    })?;
    Ok((value, canonical))
}

// ============================================================================
// ConfigDocument
// ============================================================================

/// Configuration text plus the value of its last successful parse.
#[derive(Clone, PartialEq)]
pub struct ConfigDocument {
    raw_text: String,
    parsed: Option<Value>,
}

impl ConfigDocument {
    pub fn new(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let parsed = parse(&raw_text).ok();
        Self { raw_text, parsed }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Value of the most recent successful parse. May lag behind
    /// [`raw_text`](Self::raw_text) while the text is invalid.
    pub fn parsed(&self) -> Option<&Value> {
        self.parsed.as_ref()
    }

    /// Replace the text. `parsed` only moves forward when the new text parses.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.raw_text = text.into();
        if let Ok(value) = parse(&self.raw_text) {
            self.parsed = Some(value);
        }
    }

    /// Check the current text without touching the document.
    pub fn validate(&self) -> Result<(), DocumentError> {
        parse(&self.raw_text).map(|_| ())
    }

    /// Canonicalize the text. On failure the document is left as it was.
    pub fn format_in_place(&mut self) -> Result<(), DocumentError> {
        let (value, formatted) = decode(&self.raw_text)?;
        self.raw_text = formatted;
        self.parsed = Some(value);
        Ok(())
    }
}

impl fmt::Debug for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigDocument")
            .field("len", &self.raw_text.len())
            .field("parsed", &self.parsed.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
