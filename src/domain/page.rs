//! Render request payload and page layout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    error::DomainError,
    length::{Length, LengthError},
};

pub const DEFAULT_MARGIN: &str = "1cm";

/// A4 in inches, as Chromium's print pipeline defines it.
pub const A4_WIDTH_IN: f64 = 8.27;
pub const A4_HEIGHT_IN: f64 = 11.7;

fn default_margin() -> String {
    DEFAULT_MARGIN.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    #[serde(default = "default_margin")]
    pub top: String,
    #[serde(default = "default_margin")]
    pub bottom: String,
    #[serde(default = "default_margin")]
    pub left: String,
    #[serde(default = "default_margin")]
    pub right: String,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: default_margin(),
            bottom: default_margin(),
            left: default_margin(),
            right: default_margin(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default)]
    pub margin: Margins,
}

/// Caller-supplied render input. `data` is opaque and passed to the renderer page verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub config: PageConfig,
}

/// Page margins resolved to inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginsInches {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Print layout derived from a validated request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margins: MarginsInches,
    pub print_background: bool,
}

impl RenderRequest {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            config: PageConfig::default(),
        }
    }

    /// Validate margins and produce the fixed A4 layout used for capture.
    pub fn layout(&self) -> Result<PageLayout, DomainError> {
        let margin = &self.config.margin;
        Ok(PageLayout {
            paper_width: A4_WIDTH_IN,
            paper_height: A4_HEIGHT_IN,
            margins: MarginsInches {
                top: parse_margin("top", &margin.top)?,
                bottom: parse_margin("bottom", &margin.bottom)?,
                left: parse_margin("left", &margin.left)?,
                right: parse_margin("right", &margin.right)?,
            },
            print_background: true,
        })
    }
}

fn parse_margin(side: &'static str, raw: &str) -> Result<f64, DomainError> {
    raw.parse::<Length>()
        .map(|length| length.to_inches())
        .map_err(|err: LengthError| DomainError::validation(format!("margin.{side}: {err}")))
}
