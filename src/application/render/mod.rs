//! Turning a render request into a PDF.
//!
//! [`RenderService`] is the long-lived entry point; each request gets its own
//! [`RenderPipeline`] so it can be aborted independently of the others.

mod pipeline;
mod target;
mod types;

pub use pipeline::{RenderConfig, RenderPipeline, RenderService};
pub use target::render_target;
pub use types::{RenderError, RenderOutcome, RenderState};
