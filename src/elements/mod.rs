//! Built-in filters.

pub mod demux;

pub use demux::{DemuxerConfig, DemuxerFilter};
