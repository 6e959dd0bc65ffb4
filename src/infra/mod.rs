//! Infrastructure adapters and runtime bootstrap.

pub mod chain;
pub mod error;
pub mod telemetry;
