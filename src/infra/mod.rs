//! Infrastructure adapters and runtime bootstrap.

pub mod chromium;
pub mod error;
pub mod http;
pub mod registry;
pub mod shutdown;
pub mod telemetry;
