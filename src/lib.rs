// Library root: exposes the merge core for integration tests.
// The binary entry point is src/main.rs.

pub mod bootstrap;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logger;
pub mod matcher;
pub mod pipeline;
pub mod score_csv;
