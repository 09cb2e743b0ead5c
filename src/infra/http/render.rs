use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use super::{error::ApiError, state::HttpState};
use crate::{
    application::render::{RenderOutcome, RenderPipeline},
    domain::page::RenderRequest,
};

#[derive(Debug, Deserialize)]
pub struct RenderBody {
    pub page: RenderRequest,
}

/// Aborts the pipeline if the handler future is dropped before it finishes,
/// which is how a client disconnect reaches us.
struct AbortOnDrop {
    pipeline: Option<Arc<RenderPipeline>>,
}

impl AbortOnDrop {
    fn new(pipeline: Arc<RenderPipeline>) -> Self {
        Self {
            pipeline: Some(pipeline),
        }
    }

    fn disarm(mut self) {
        self.pipeline = None;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        let Some(pipeline) = self.pipeline.take() else {
            return;
        };
        if pipeline.state().is_terminal() {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            debug!(
                target = "pressroom::http::render",
                render_id = %pipeline.id(),
                "client went away; aborting render"
            );
            runtime.spawn(async move { pipeline.abort().await });
        }
    }
}

pub async fn render_pdf(
    State(state): State<HttpState>,
    Path(renderer): Path<String>,
    payload: Result<Json<RenderBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::InvalidPage(rejection.body_text()))?;

    let pipeline = state.render.pipeline();
    let guard = AbortOnDrop::new(pipeline.clone());
    let outcome = pipeline.render(&body.page, &renderer).await;
    guard.disarm();

    match outcome? {
        RenderOutcome::Completed(pdf) => {
            Ok(([(header::CONTENT_TYPE, "application/pdf")], pdf).into_response())
        }
        RenderOutcome::Aborted => Err(ApiError::Internal("render aborted".to_string())),
    }
}
