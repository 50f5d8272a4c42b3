// Library root: re-exports all modules so the ingest crate, the CLI and the
// integration tests can reach the public API.

pub mod config;
pub mod db;
pub mod features;
pub mod model;
pub mod names;
pub mod report;
pub mod tables;
