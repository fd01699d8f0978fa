//! CLI command implementations.

pub mod curate;
pub mod experiments;
pub mod progress;
