//! Chromium implementation of the engine seam, driven over CDP.
//!
//! One browser process backs every session; each session is its own
//! browser context so cookies, storage and cache never leak between renders.

mod network;
mod page;

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use chromiumoxide::{
    Browser, BrowserConfig,
    cdp::browser_protocol::{
        browser::BrowserContextId,
        target::{CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams},
    },
    error::CdpError,
};
use futures::StreamExt;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    application::engine::{Engine, EngineError, EngineLauncher, EnginePage, EngineSession},
    config::BrowserSettings,
};
use page::ChromiumPage;

/// Map a CDP failure onto the engine error taxonomy.
pub(crate) fn classify(err: CdpError) -> EngineError {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            EngineError::connection_lost(err.to_string())
        }
        other => EngineError::protocol(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    no_sandbox: bool,
    launch_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            executable: settings.executable.clone(),
            no_sandbox: settings.no_sandbox,
            launch_timeout: settings.launch_timeout,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, EngineError> {
        let mut builder = BrowserConfig::builder()
            .launch_timeout(self.launch_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--hide-scrollbars")
            .arg("--mute-audio");
        if let Some(path) = self.executable.as_ref() {
            builder = builder.chrome_executable(path);
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        builder.build().map_err(EngineError::launch)
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn Engine>, EngineError> {
        let config = self.browser_config()?;
        let launched = tokio::time::timeout(self.launch_timeout, Browser::launch(config))
            .await
            .map_err(|_| {
                EngineError::launch(format!(
                    "browser did not start within {}s",
                    self.launch_timeout.as_secs()
                ))
            })?;
        let (browser, mut handler) = launched.map_err(|err| EngineError::launch(err.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(
                        target = "pressroom::chromium",
                        error = %err,
                        "browser connection handler stopped"
                    );
                    break;
                }
            }
            debug!(target = "pressroom::chromium", "browser event loop finished");
        });

        info!(
            target = "pressroom::chromium",
            executable = ?self.executable,
            no_sandbox = self.no_sandbox,
            "browser launched"
        );

        Ok(Arc::new(ChromiumEngine {
            browser: Arc::new(RwLock::new(browser)),
            events,
        }))
    }
}

struct ChromiumEngine {
    browser: Arc<RwLock<Browser>>,
    events: JoinHandle<()>,
}

#[async_trait]
impl Engine for ChromiumEngine {
    async fn new_session(&self) -> Result<Arc<dyn EngineSession>, EngineError> {
        let created = self
            .browser
            .read()
            .await
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(classify)?;

        Ok(Arc::new(ChromiumSession {
            browser: self.browser.clone(),
            context_id: created.result.browser_context_id,
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        let mut browser = self.browser.write().await;
        let closed = browser.close().await.map(|_| ()).map_err(classify);
        if let Err(err) = browser.wait().await {
            debug!(
                target = "pressroom::chromium",
                error = %err,
                "browser process did not exit cleanly"
            );
        }
        self.events.abort();
        closed
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        self.events.abort();
    }
}

struct ChromiumSession {
    browser: Arc<RwLock<Browser>>,
    context_id: BrowserContextId,
}

#[async_trait]
impl EngineSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn EnginePage>, EngineError> {
        let mut params = CreateTargetParams::new("about:blank");
        params.browser_context_id = Some(self.context_id.clone());

        let page = self
            .browser
            .read()
            .await
            .new_page(params)
            .await
            .map_err(classify)?;
        Ok(Box::new(ChromiumPage::new(page)))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.browser
            .read()
            .await
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
            .map(|_| ())
            .map_err(classify)
    }
}
