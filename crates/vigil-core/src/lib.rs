//! vigil core: transport-agnostic primitives shared by the gateway pipeline.
//!
//! This crate defines the error surface (`VigilError`, `ApiError`,
//! `NormalizedError`), the immutable `LogRecord` that fans out to every sink,
//! and the formatter that renders records per sink. It carries no HTTP or
//! runtime dependencies so it can be reused by tooling and tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `VigilError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod format;
pub mod record;

pub use error::{ApiError, NormalizedError, Result, VigilError};
pub use record::{Fields, Level, LogRecord};
