//! In-memory engine used by unit tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use tokio::sync::Notify;

use super::{Engine, EngineError, EngineLauncher, EnginePage, EngineSession, NetworkIdle};
use crate::domain::page::PageLayout;

/// How pages opened by the fake engine behave.
#[derive(Debug, Clone)]
pub(crate) enum PageScript {
    /// Readiness marker appears right after navigation.
    Ready,
    /// The page raises a script error and never becomes ready.
    ScriptError(String),
    /// Navigation never finishes.
    HangOnNavigate,
}

#[derive(Default)]
struct FakeState {
    launch_delay: Mutex<Duration>,
    launch_failures: AtomicUsize,
    launches: AtomicUsize,
    engine_closes: AtomicUsize,
    session_failures: Mutex<VecDeque<EngineError>>,
    sessions_opened: AtomicUsize,
    session_closes: AtomicUsize,
    fail_session_close: AtomicBool,
    session_close_delay: Mutex<Duration>,
    script: Mutex<Option<PageScript>>,
    navigations: Mutex<Vec<String>>,
    navigation_started: Notify,
    printed: Mutex<Vec<PageLayout>>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeLauncher {
    state: Arc<FakeState>,
}

impl FakeLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared(&self) -> Arc<dyn EngineLauncher> {
        Arc::new(self.clone())
    }

    pub(crate) fn with_launch_delay(self, delay: Duration) -> Self {
        *self.state.launch_delay.lock().expect("lock") = delay;
        self
    }

    pub(crate) fn fail_launches(self, count: usize) -> Self {
        self.state.launch_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Queue errors returned by the next `new_session` calls, in order.
    pub(crate) fn fail_sessions(self, errors: impl IntoIterator<Item = EngineError>) -> Self {
        self.state
            .session_failures
            .lock()
            .expect("lock")
            .extend(errors);
        self
    }

    pub(crate) fn fail_session_close(self) -> Self {
        self.state.fail_session_close.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_session_close_delay(self, delay: Duration) -> Self {
        *self.state.session_close_delay.lock().expect("lock") = delay;
        self
    }

    pub(crate) fn with_script(self, script: PageScript) -> Self {
        *self.state.script.lock().expect("lock") = Some(script);
        self
    }

    pub(crate) fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn engine_closes(&self) -> usize {
        self.state.engine_closes.load(Ordering::SeqCst)
    }

    pub(crate) fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    pub(crate) fn session_closes(&self) -> usize {
        self.state.session_closes.load(Ordering::SeqCst)
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.state.navigations.lock().expect("lock").clone()
    }

    pub(crate) fn printed(&self) -> Vec<PageLayout> {
        self.state.printed.lock().expect("lock").clone()
    }

    pub(crate) async fn navigation_started(&self) {
        self.state.navigation_started.notified().await;
    }
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn Engine>, EngineError> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.launch_delay.lock().expect("lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.state.launch_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state
                .launch_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::launch("fake launch failure"));
        }

        Ok(Arc::new(FakeEngine {
            state: self.state.clone(),
        }))
    }
}

struct FakeEngine {
    state: Arc<FakeState>,
}

#[async_trait]
impl Engine for FakeEngine {
    async fn new_session(&self) -> Result<Arc<dyn EngineSession>, EngineError> {
        if let Some(err) = self
            .state
            .session_failures
            .lock()
            .expect("lock")
            .pop_front()
        {
            return Err(err);
        }
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeSession {
            state: self.state.clone(),
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.state.engine_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeSession {
    state: Arc<FakeState>,
}

#[async_trait]
impl EngineSession for FakeSession {
    async fn new_page(&self) -> Result<Box<dyn EnginePage>, EngineError> {
        let script = self
            .state
            .script
            .lock()
            .expect("lock")
            .clone()
            .unwrap_or(PageScript::Ready);
        Ok(Box::new(FakePage {
            state: self.state.clone(),
            script,
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.state.session_closes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.session_close_delay.lock().expect("lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_session_close.load(Ordering::SeqCst) {
            return Err(EngineError::protocol("fake close failure"));
        }
        Ok(())
    }
}

struct FakePage {
    state: Arc<FakeState>,
    script: PageScript,
}

#[async_trait]
impl EnginePage for FakePage {
    async fn failures(&self) -> Result<BoxStream<'static, String>, EngineError> {
        Ok(match &self.script {
            PageScript::ScriptError(message) => stream::once(futures::future::ready(message.clone()))
                .chain(stream::pending())
                .boxed(),
            _ => stream::pending().boxed(),
        })
    }

    async fn navigate(&self, url: &str, _idle: NetworkIdle) -> Result<(), EngineError> {
        self.state
            .navigations
            .lock()
            .expect("lock")
            .push(url.to_string());
        self.state.navigation_started.notify_one();
        if matches!(self.script, PageScript::HangOnNavigate) {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn emulate_screen_media(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str, _poll: Duration) -> Result<(), EngineError> {
        match self.script {
            PageScript::Ready => Ok(()),
            _ => futures::future::pending().await,
        }
    }

    async fn print_pdf(&self, layout: &PageLayout) -> Result<Vec<u8>, EngineError> {
        self.state.printed.lock().expect("lock").push(*layout);
        Ok(b"%PDF-1.7 fake".to_vec())
    }
}
