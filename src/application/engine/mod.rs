//! Browser engine seam.
//!
//! The pool and the render pipeline only talk to these traits. The Chromium
//! implementation lives in `infra::chromium`; tests substitute an in-memory
//! engine.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::page::PageLayout;

#[cfg(test)]
pub(crate) mod fake;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// The engine process is gone or its control channel is closed.
    #[error("engine connection lost: {0}")]
    ConnectionLost(String),
    #[error("engine failed to launch: {0}")]
    Launch(String),
    #[error("engine protocol error: {0}")]
    Protocol(String),
}

impl EngineError {
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost(message.into())
    }

    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, EngineError::ConnectionLost(_))
    }
}

/// Network quiescence heuristic applied after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdle {
    /// Requests allowed to stay in flight while the page counts as idle.
    pub max_inflight: usize,
    /// How long the in-flight count must stay at or below `max_inflight`.
    pub window: Duration,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        Self {
            max_inflight: 2,
            window: Duration::from_millis(500),
        }
    }
}

/// Starts engine processes.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Engine>, EngineError>;
}

/// One running engine process shared by every session.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Open an isolated context (own cookies, storage and cache).
    async fn new_session(&self) -> Result<Arc<dyn EngineSession>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait EngineSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn EnginePage>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait EnginePage: Send + Sync {
    /// Subscribe to script errors and crashes. Must be called before `navigate`
    /// so nothing raised during load is missed.
    async fn failures(&self) -> Result<BoxStream<'static, String>, EngineError>;

    /// Load `url` and return once the network has gone quiet.
    async fn navigate(&self, url: &str, idle: NetworkIdle) -> Result<(), EngineError>;

    async fn emulate_screen_media(&self) -> Result<(), EngineError>;

    /// Resolve once an element matching `selector` exists.
    async fn wait_for_selector(&self, selector: &str, poll: Duration) -> Result<(), EngineError>;

    async fn print_pdf(&self, layout: &PageLayout) -> Result<Vec<u8>, EngineError>;
}
