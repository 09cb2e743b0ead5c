use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_gauge!(
            "pressroom_sessions_active",
            Unit::Count,
            "Browser sessions currently holding an admission slot."
        );
        describe_counter!(
            "pressroom_engine_restart_total",
            Unit::Count,
            "Engine relaunches triggered by a lost connection."
        );
        describe_counter!(
            "pressroom_render_total",
            Unit::Count,
            "Finished renders, labelled by outcome."
        );
        describe_histogram!(
            "pressroom_render_ms",
            Unit::Milliseconds,
            "Render latency from admission to outcome in milliseconds."
        );
        describe_counter!(
            "pressroom_rate_limited_total",
            Unit::Count,
            "Render requests rejected by the rate limiter."
        );
    });
}
