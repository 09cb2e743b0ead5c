//! Domain layer types and invariants.

pub mod error;
pub mod length;
pub mod page;
pub mod registry;
