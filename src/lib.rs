//! # mediagraph
//!
//! Media pipeline filters connected by typed ports.
//!
//! The centerpiece is the demuxer: a [`DemuxerFilter`](elements::DemuxerFilter)
//! stages incoming bytes in a [`DataPacker`](elements::demux::DataPacker),
//! lets a container plugin read arbitrary ranges from it, negotiates one
//! output port per elementary stream and dispatches frames to them. The same
//! plugin code runs whether the filter pulls from upstream or upstream
//! pushes into the filter.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mediagraph::prelude::*;
//!
//! let registry = Arc::new(PluginRegistry::new());
//! registry.register(Arc::new(WavFactory));
//!
//! let demuxer = DemuxerFilter::new("demux", registry, DemuxerConfig::default());
//! demuxer.link_upstream(file_source);
//! demuxer.set_stream_linker(move |_port, _track| Some(audio_sink.clone()));
//!
//! let mut events = demuxer.subscribe();
//! demuxer.prepare()?;
//! events.wait_eos().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod element;
pub mod elements;
pub mod error;
pub mod events;
pub mod format;
pub mod memory;
pub mod metadata;
pub mod negotiation;
pub mod observability;
pub mod plugin;
pub mod task;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::Buffer;
    pub use crate::element::{
        DownstreamPort, Filter, FilterState, OutputPort, PortParams, UpstreamPort, WorkMode,
    };
    pub use crate::elements::demux::{DataPacker, DemuxerConfig, DemuxerFilter};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::events::{EventReceiver, FilterEvent};
    pub use crate::format::{Caps, MediaInfo, SeekMode, TrackInfo};
    pub use crate::memory::{Allocator, HeapAllocator, Memory};
    pub use crate::metadata::{BufferFlags, Metadata};
    pub use crate::plugin::{
        DataSource, DemuxerFactory, DemuxerPlugin, PluginRegistry, ProbeSource, Seekable,
    };
}

pub use error::{Error, ErrorKind, Result};
