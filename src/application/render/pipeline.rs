//! One render request from slot admission to PDF bytes.
//!
//! A pipeline owns at most one pooled session. Whatever way the render ends
//! (completed, failed, timed out or aborted) that session is closed and its
//! slot handed back before the pipeline reports the outcome.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::{
    target::render_target,
    types::{RenderError, RenderOutcome, RenderState},
};
use crate::{
    application::{
        engine::NetworkIdle,
        pool::{PooledSession, SessionPool},
    },
    domain::{
        page::{PageLayout, RenderRequest},
        registry::RendererRegistry,
    },
    util::lock::mutex_lock,
};

const LOCK_TARGET: &str = "pressroom::render::pipeline";

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Selector whose presence marks the renderer page as ready to print.
    pub ready_selector: String,
    pub ready_poll_interval: Duration,
    pub network_idle: NetworkIdle,
    /// Upper bound for a whole render; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ready_selector: "#ready".to_string(),
            ready_poll_interval: Duration::from_millis(100),
            network_idle: NetworkIdle::default(),
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Hands out one [`RenderPipeline`] per request, all sharing the same pool.
#[derive(Clone)]
pub struct RenderService {
    pool: Arc<SessionPool>,
    registry: Arc<RendererRegistry>,
    config: Arc<RenderConfig>,
}

impl RenderService {
    pub fn new(pool: Arc<SessionPool>, registry: Arc<RendererRegistry>, config: RenderConfig) -> Self {
        Self {
            pool,
            registry,
            config: Arc::new(config),
        }
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    pub fn registry(&self) -> &Arc<RendererRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn pipeline(&self) -> Arc<RenderPipeline> {
        Arc::new(RenderPipeline {
            id: Uuid::new_v4(),
            pool: self.pool.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            state: Mutex::new(RenderState::Idle),
            session: Mutex::new(None),
            abort: watch::Sender::new(false),
        })
    }
}

pub struct RenderPipeline {
    id: Uuid,
    pool: Arc<SessionPool>,
    registry: Arc<RendererRegistry>,
    config: Arc<RenderConfig>,
    state: Mutex<RenderState>,
    session: Mutex<Option<Arc<PooledSession>>>,
    abort: watch::Sender<bool>,
}

impl RenderPipeline {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RenderState {
        *mutex_lock(&self.state, LOCK_TARGET, "pipeline::state")
    }

    /// Render `request` with the renderer registered as `renderer`.
    ///
    /// Returns [`RenderOutcome::Aborted`] when [`abort`](Self::abort) wins the
    /// race against completion.
    pub async fn render(
        &self,
        request: &RenderRequest,
        renderer: &str,
    ) -> Result<RenderOutcome, RenderError> {
        let started = Instant::now();
        let result = match self.prepare(request, renderer) {
            Ok((target, layout)) => {
                let mut aborted = self.abort.subscribe();
                tokio::select! {
                    biased;
                    _ = aborted.wait_for(|flag| *flag) => Ok(None),
                    result = self.run_with_deadline(target.as_str(), &layout) => result.map(Some),
                }
            }
            Err(err) => Err(err),
        };

        self.finish(renderer, started, result).await
    }

    /// Resolve the renderer and validate the request before any slot is taken.
    fn prepare(
        &self,
        request: &RenderRequest,
        renderer: &str,
    ) -> Result<(Url, PageLayout), RenderError> {
        let binding = self
            .registry
            .lookup(renderer)
            .ok_or_else(|| RenderError::UnknownRenderer(renderer.to_string()))?;
        let layout = request.layout()?;
        let target = render_target(&binding.url, renderer, &request.data)?;

        debug!(
            target = "pressroom::render",
            render_id = %self.id,
            renderer,
            url = %binding.url,
            "render started"
        );
        Ok((target, layout))
    }

    /// Stop an in-flight render and release its session. Later calls, and
    /// calls after the render has finished, do nothing.
    pub async fn abort(&self) {
        if self.state().is_terminal() {
            return;
        }
        if self.abort.send_replace(true) {
            return;
        }

        self.set_state(RenderState::Aborted);
        info!(
            target = "pressroom::render",
            render_id = %self.id,
            "render aborted"
        );
        self.close_session().await;
    }

    async fn run_with_deadline(
        &self,
        target: &str,
        layout: &PageLayout,
    ) -> Result<Vec<u8>, RenderError> {
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(target, layout))
                .await
                .map_err(|_| RenderError::TimedOut(limit))?,
            None => self.run(target, layout).await,
        }
    }

    async fn run(&self, target: &str, layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
        let session = Arc::new(self.pool.create_session().await?);
        *mutex_lock(&self.session, LOCK_TARGET, "pipeline::store_session") = Some(session.clone());
        self.set_state(RenderState::SessionAcquired);

        let page = session.new_page().await?;
        self.set_state(RenderState::Navigating);

        let mut failures = page.failures().await?;
        page.navigate(target, self.config.network_idle).await?;
        page.emulate_screen_media().await?;
        self.set_state(RenderState::AwaitingReady);

        tokio::select! {
            biased;
            Some(message) = failures.next() => {
                return Err(RenderError::Page { message });
            }
            ready = page.wait_for_selector(
                &self.config.ready_selector,
                self.config.ready_poll_interval,
            ) => ready?,
        }

        Ok(page.print_pdf(layout).await?)
    }

    async fn finish(
        &self,
        renderer: &str,
        started: Instant,
        result: Result<Option<Vec<u8>>, RenderError>,
    ) -> Result<RenderOutcome, RenderError> {
        let terminal = match &result {
            Ok(Some(_)) => RenderState::Completed,
            Ok(None) => RenderState::Aborted,
            Err(_) => RenderState::Failed,
        };
        self.set_state(terminal);
        self.close_session().await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = match &result {
            Ok(Some(pdf)) => {
                info!(
                    target = "pressroom::render",
                    render_id = %self.id,
                    renderer,
                    bytes = pdf.len(),
                    elapsed_ms,
                    "render completed"
                );
                "completed"
            }
            Ok(None) => "aborted",
            Err(err) => {
                warn!(
                    target = "pressroom::render",
                    render_id = %self.id,
                    renderer,
                    kind = err.kind(),
                    error = %err,
                    elapsed_ms,
                    "render failed"
                );
                err.kind()
            }
        };
        metrics::counter!("pressroom_render_total", "outcome" => outcome).increment(1);
        metrics::histogram!("pressroom_render_ms").record(elapsed_ms as f64);

        result.map(|pdf| match pdf {
            Some(pdf) => RenderOutcome::Completed(pdf),
            None => RenderOutcome::Aborted,
        })
    }

    /// Move forward unless a terminal state has already been reached.
    fn set_state(&self, next: RenderState) {
        let mut state = mutex_lock(&self.state, LOCK_TARGET, "pipeline::set_state");
        if !state.is_terminal() {
            *state = next;
        }
    }

    async fn close_session(&self) {
        let session = mutex_lock(&self.session, LOCK_TARGET, "pipeline::take_session").take();
        if let Some(session) = session {
            session.close().await;
        }
    }
}
