use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use super::state::HttpState;
use crate::application::pool::PoolStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBody {
    pub status: &'static str,
    /// Seconds since the service started.
    pub uptime: f64,
    pub timestamp: String,
    pub sessions: PoolStats,
    pub render_config: Value,
}

pub async fn health(State(state): State<HttpState>) -> Json<HealthBody> {
    let render_config = if state.environment.is_development() {
        serde_json::to_value(state.render.registry().summary()).unwrap_or(Value::Null)
    } else {
        Value::String("redacted".to_string())
    };

    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    Json(HealthBody {
        status: "ok",
        uptime: state.started_at.elapsed().as_secs_f64(),
        timestamp,
        sessions: state.render.pool().stats(),
        render_config,
    })
}
