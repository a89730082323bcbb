//! # Repository Layer
//!
//! One repository per table group:
//!
//! - [`queue`] - The sync_queue work table
//! - [`telemetry`] - Append-only api_call_log and circuit_state_log

pub mod queue;
pub mod telemetry;
