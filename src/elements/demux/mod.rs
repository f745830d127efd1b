//! Demultiplexing.
//!
//! - [`DemuxerFilter`]: drives a [`DemuxerPlugin`](crate::plugin::DemuxerPlugin)
//!   in pull or push mode and routes frames to per-track output ports
//! - [`DataPacker`]: byte-range staging queue between input and plugin
//! - [`DataSourceImpl`]: the plugin's view of the input
//! - [`TypeFinder`]: picks the plugin for an input

mod config;
mod data_packer;
mod data_source;
mod filter;
mod type_finder;

pub use config::DemuxerConfig;
pub use data_packer::{Availability, DataPacker, RangeRead, ReadMode};
pub use data_source::{DataSourceImpl, DemuxInput};
pub use filter::{DemuxerFilter, StreamLinker};
pub use type_finder::{MAX_CONFIDENCE, TypeFinder, TypeMatch};
