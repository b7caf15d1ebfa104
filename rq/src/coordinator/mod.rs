//! Coordinator role: broadcast a query, collect bounded replies
//!
//! The coordinator owns its bus endpoint, fans the `QTY` command out to
//! all connected providers, and runs the sequential collect loop with
//! per-reply timeouts and skip-and-ack handling for malformed replies.

mod core;

pub use core::Coordinator;
