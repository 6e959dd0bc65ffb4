//! Document graph cache and traversal engine behind the `daoctl` CLI.

pub mod cache;
pub mod config;
pub mod graph;
pub mod infra;
pub mod prompt;
pub mod remote;
pub mod render;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use docgraph_types as types;
