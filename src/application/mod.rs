//! Application services: session pooling and the render pipeline.

pub mod engine;
pub mod error;
pub mod pool;
pub mod render;
