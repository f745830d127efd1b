//! Demuxer plugin interfaces and the factory registry.
//!
//! Container formats are implemented outside this crate as
//! [`DemuxerPlugin`]s. Each format registers a [`DemuxerFactory`] in a
//! [`PluginRegistry`]; the demuxer filter probes the input against the
//! registered factories and instantiates the best match.

mod demuxer;
mod registry;

pub use demuxer::{DataSource, DemuxerFactory, DemuxerPlugin, ProbeSource, Seekable};
pub use registry::PluginRegistry;
