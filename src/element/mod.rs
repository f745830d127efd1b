//! Filter abstractions.
//!
//! - [`Filter`]: lifecycle contract shared by every pipeline stage
//! - [`UpstreamPort`] / [`DownstreamPort`]: what a filter reads from and
//!   writes to
//! - [`OutputPort`]: a filter-owned output bound to one track
//!
//! Filters are synchronous: each one owns a worker thread that runs its
//! processing loop, and ports are plain trait objects called from it.

mod pad;
mod traits;

pub use pad::{DownstreamPort, OutputPort, PortParams, UpstreamPort, WorkMode};
pub use traits::{Filter, FilterState};
