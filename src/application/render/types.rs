use std::{fmt, time::Duration};

use thiserror::Error;

use crate::{application::engine::EngineError, domain::error::DomainError};

#[derive(Debug, Error)]
pub enum RenderError {
    /// The requested renderer has no registry entry.
    #[error("renderer `{0}` is not configured")]
    UnknownRenderer(String),
    #[error(transparent)]
    InvalidRequest(#[from] DomainError),
    /// The target page reported a failure before signalling readiness.
    #[error("page reported an error: {message}")]
    Page { message: String },
    #[error("render did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("request payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RenderError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::UnknownRenderer(_) => "unknown_renderer",
            RenderError::InvalidRequest(_) => "invalid_request",
            RenderError::Page { .. } => "page_error",
            RenderError::TimedOut(_) => "timed_out",
            RenderError::Payload(_) => "payload",
            RenderError::Engine(_) => "engine",
        }
    }
}

/// How a render that did not fail ended.
#[derive(Debug)]
pub enum RenderOutcome {
    Completed(Vec<u8>),
    /// The render was aborted before completion; nothing was produced.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    SessionAcquired,
    Navigating,
    AwaitingReady,
    Completed,
    Failed,
    Aborted,
}

impl RenderState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RenderState::Completed | RenderState::Failed | RenderState::Aborted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderState::Idle => "idle",
            RenderState::SessionAcquired => "session_acquired",
            RenderState::Navigating => "navigating",
            RenderState::AwaitingReady => "awaiting_ready",
            RenderState::Completed => "completed",
            RenderState::Failed => "failed",
            RenderState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
