//! vigil gateway library entry.
//!
//! Wires the config loader, metric registry, sink fan-out logger and request
//! middleware into an axum stack around the caller's business routes. Used by
//! the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod middleware;
pub mod obs;
pub mod ops;
pub mod router;
