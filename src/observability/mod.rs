//! Structured logging.
//!
//! mediagraph logs through `tracing` and never installs a subscriber.
//! Filters run their worker inside a [`span_filter`] span, so every event
//! from a worker carries the filter name.
//!
//! ## Example
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("mediagraph=debug")
//!     .init();
//! ```

mod tracing_support;

pub use tracing_support::{
    span_filter, trace_eos, trace_error, trace_frame_routed, trace_state_change,
};
