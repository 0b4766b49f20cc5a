//! HTTP/WebSocket server for tournament brackets.
//!
//! The binary in `main.rs` wires configuration, logging, storage and metrics
//! together and serves [`api::create_router`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
