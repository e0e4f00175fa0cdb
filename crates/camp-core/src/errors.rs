//! Structured error types shared across camp crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`CampError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, indices, tokens).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the camp engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CampError {
    /// Criteria expression parse and validation errors.
    #[error("criteria error: {0}")]
    Criteria(ErrorInfo),
    /// Structural document patch errors.
    #[error("patch error: {0}")]
    Patch(ErrorInfo),
    /// Experiment generation and batch identity errors.
    #[error("experiment error: {0}")]
    Experiment(ErrorInfo),
    /// Execution environment and command generation errors.
    #[error("exec error: {0}")]
    Exec(ErrorInfo),
    /// Collation and statistics errors.
    #[error("collate error: {0}")]
    Collate(ErrorInfo),
    /// Stage sequencing and artifact precondition errors.
    #[error("stage error: {0}")]
    Stage(ErrorInfo),
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl CampError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CampError::Criteria(info)
            | CampError::Patch(info)
            | CampError::Experiment(info)
            | CampError::Exec(info)
            | CampError::Collate(info)
            | CampError::Stage(info)
            | CampError::Config(info)
            | CampError::Io(info)
            | CampError::Serde(info) => info,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Wraps a filesystem error, recording the offending path.
    pub fn io(code: &str, path: &Path, err: impl ToString) -> Self {
        CampError::Io(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
        )
    }
}
