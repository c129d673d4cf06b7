//! Request pipeline middleware, outermost first:
//! - `instrument::track`: latency histogram + request counter
//! - `access_log::access_log`: combined-format access line
//! - `errors::normalize`: failure logging and client error body
//!
//! `instrument::tag_matched_path` sits on the routes themselves.

pub mod access_log;
pub mod errors;
pub mod instrument;

pub use errors::{HandlerError, HandlerResult};
