use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::{
    Page,
    cdp::{
        browser_protocol::{
            emulation::SetEmulatedMediaParams,
            inspector::{self, EventTargetCrashed},
            network::{
                self, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
            },
            page::PrintToPdfParams,
        },
        js_protocol::runtime::EventExceptionThrown,
    },
};
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use tracing::debug;

use super::{
    classify,
    network::{InflightTracker, NetworkEvent, Quiet},
};
use crate::{
    application::engine::{EngineError, EnginePage, NetworkIdle},
    domain::page::PageLayout,
};

pub(super) struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    pub(super) fn new(page: Page) -> Self {
        Self { page }
    }

    async fn network_events(&self) -> Result<BoxStream<'static, NetworkEvent>, EngineError> {
        let started = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(classify)?
            .map(|event| NetworkEvent::Started(event.request_id.inner().clone()));
        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(classify)?
            .map(|event| NetworkEvent::Finished(event.request_id.inner().clone()));
        let failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(classify)?
            .map(|event| NetworkEvent::Finished(event.request_id.inner().clone()));

        Ok(stream::select_all([started.boxed(), finished.boxed(), failed.boxed()]).boxed())
    }
}

#[async_trait]
impl EnginePage for ChromiumPage {
    async fn failures(&self) -> Result<BoxStream<'static, String>, EngineError> {
        self.page
            .execute(inspector::EnableParams::default())
            .await
            .map_err(classify)?;

        let exceptions = self
            .page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(classify)?
            .map(|event| {
                let details = &event.exception_details;
                details
                    .exception
                    .as_ref()
                    .and_then(|exception| exception.description.clone())
                    .unwrap_or_else(|| details.text.clone())
            });
        let crashes = self
            .page
            .event_listener::<EventTargetCrashed>()
            .await
            .map_err(classify)?
            .map(|_| "renderer page crashed".to_string());

        Ok(stream::select(exceptions, crashes).boxed())
    }

    async fn navigate(&self, url: &str, idle: NetworkIdle) -> Result<(), EngineError> {
        self.page
            .execute(network::EnableParams::default())
            .await
            .map_err(classify)?;
        let mut events = self.network_events().await?;

        self.page.goto(url).await.map_err(classify)?;

        let mut tracker = InflightTracker::new(idle, Instant::now());
        loop {
            let wait = match tracker.poll(Instant::now()) {
                Quiet::Idle => break,
                Quiet::Wait(wait) => wait,
            };
            tokio::select! {
                biased;
                event = events.next() => match event {
                    Some(event) => tracker.apply(event, Instant::now()),
                    None => break,
                },
                _ = tokio::time::sleep(wait) => {}
            }
        }

        debug!(
            target = "pressroom::chromium::page",
            inflight = tracker.inflight(),
            "network idle"
        );
        Ok(())
    }

    async fn emulate_screen_media(&self) -> Result<(), EngineError> {
        self.page
            .execute(SetEmulatedMediaParams::builder().media("screen").build())
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn wait_for_selector(&self, selector: &str, poll: Duration) -> Result<(), EngineError> {
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    let err = classify(err);
                    if err.is_connection_lost() {
                        return Err(err);
                    }
                }
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn print_pdf(&self, layout: &PageLayout) -> Result<Vec<u8>, EngineError> {
        let params = PrintToPdfParams::builder()
            .print_background(layout.print_background)
            .paper_width(layout.paper_width)
            .paper_height(layout.paper_height)
            .margin_top(layout.margins.top)
            .margin_bottom(layout.margins.bottom)
            .margin_left(layout.margins.left)
            .margin_right(layout.margins.right)
            .build();

        self.page.pdf(params).await.map_err(classify)
    }
}
