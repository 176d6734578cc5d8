//! Device vital ingestion: validation, storage, and per-device analytics.
//!
//! The binary entrypoint lives in `main.rs`; modules are public so the
//! integration tests can drive the HTTP layer against an in-memory store.

pub mod analytics;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod store;
pub mod validate;
