//! Ports: the connection points between filters.
//!
//! A filter reads its input through an [`UpstreamPort`] and hands each
//! elementary stream to a [`DownstreamPort`] peer. Output ports are created
//! at runtime, one per exposed stream, and negotiated once before the first
//! frame is pushed.

use crate::buffer::Buffer;
use crate::error::Result;
use crate::format::{Caps, MediaKind, TrackInfo, VideoBitstreamFormat};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// How a filter obtains its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkMode {
    /// The filter requests ranges from upstream on demand.
    Pull,
    /// Upstream pushes data whenever it has some.
    Push,
}

/// Stream parameters exchanged while setting up an output port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortParams {
    /// Track carried by the port.
    pub track_id: u32,
    /// Mime type of the stream.
    pub mime: String,
    /// Sample rate in Hz, audio only.
    pub sample_rate: Option<u32>,
    /// Channel count delivered on the port, audio only.
    pub channels: Option<u16>,
    /// Frame size in pixels, video only.
    pub video_size: Option<(u32, u32)>,
    /// Bitstream layout delivered on the port, video only.
    pub bitstream_format: Option<VideoBitstreamFormat>,
    /// Codec configuration record.
    pub codec_config: Option<Bytes>,
}

impl PortParams {
    /// Parameters describing a track as stored in the container.
    pub fn from_track(track: &TrackInfo) -> Self {
        let mut params = Self {
            track_id: track.track_id,
            mime: track.mime.clone(),
            codec_config: track.codec_config.clone(),
            ..Default::default()
        };
        match track.kind() {
            MediaKind::Audio => {
                if let Some(audio) = &track.audio {
                    params.sample_rate = Some(audio.sample_rate);
                    params.channels = Some(audio.channels);
                }
            }
            MediaKind::Video => {
                if let Some(video) = &track.video {
                    params.video_size = Some((video.width, video.height));
                }
            }
            MediaKind::Subtitle | MediaKind::Unknown => {}
        }
        params
    }
}

/// Input side of a filter.
pub trait UpstreamPort: Send + Sync {
    /// Read `size` bytes starting at `offset`.
    ///
    /// May return fewer bytes than requested. An empty buffer or
    /// [`Error::EndOfStream`](crate::Error::EndOfStream) means nothing is
    /// left at `offset`.
    fn pull_data(&self, offset: u64, size: usize) -> Result<Buffer>;

    /// Whether [`pull_data`](Self::pull_data) is usable.
    fn supports_pull(&self) -> bool;

    /// Total size of the media in bytes, if known.
    fn media_size(&self) -> Option<u64> {
        None
    }
}

/// Consumer of one elementary stream.
pub trait DownstreamPort: Send + Sync {
    /// Deliver a frame. `offset` is the byte position of the frame in the
    /// input, when meaningful.
    fn push_data(&self, buffer: Buffer, offset: Option<u64>) -> Result<()>;

    /// Agree on a format.
    ///
    /// `caps` describe what the stream carries. The peer answers with the
    /// caps it accepts and its own parameters, or `None` to refuse the link.
    fn negotiate(&self, caps: &Caps, params: &PortParams) -> Option<(Caps, PortParams)>;

    /// Apply the negotiated parameters. Returns the parameters in effect, or
    /// `None` if the peer cannot be configured.
    fn configure(&self, track_id: u32, params: &PortParams) -> Option<PortParams>;
}

/// An output port of a filter, bound to one track.
#[derive(Clone)]
pub struct OutputPort {
    name: String,
    track_id: u32,
    peer: Option<Arc<dyn DownstreamPort>>,
    needs_negotiation: bool,
    params: Option<PortParams>,
}

impl OutputPort {
    /// Create an unlinked port for a track.
    pub fn new(name: impl Into<String>, track_id: u32) -> Self {
        Self {
            name: name.into(),
            track_id,
            peer: None,
            needs_negotiation: true,
            params: None,
        }
    }

    /// Port name, unique within the filter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Track routed through this port.
    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    /// The linked peer, if any.
    pub fn peer(&self) -> Option<&Arc<dyn DownstreamPort>> {
        self.peer.as_ref()
    }

    /// Link the port to a peer. A new link has to be negotiated again.
    pub fn link(&mut self, peer: Arc<dyn DownstreamPort>) {
        self.peer = Some(peer);
        self.needs_negotiation = true;
        self.params = None;
    }

    /// Returns true until [`set_configured`](Self::set_configured) is called
    /// for the current link.
    pub fn needs_negotiation(&self) -> bool {
        self.needs_negotiation
    }

    /// Record the parameters the peer was configured with.
    pub fn set_configured(&mut self, params: PortParams) {
        self.params = Some(params);
        self.needs_negotiation = false;
    }

    /// Parameters in effect on the link.
    pub fn params(&self) -> Option<&PortParams> {
        self.params.as_ref()
    }

    /// Forward a buffer to the peer. Buffers on unlinked ports are dropped.
    pub fn push(&self, buffer: Buffer) -> Result<()> {
        match &self.peer {
            Some(peer) => peer.push_data(buffer, None),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPort")
            .field("name", &self.name)
            .field("track_id", &self.track_id)
            .field("linked", &self.peer.is_some())
            .field("needs_negotiation", &self.needs_negotiation)
            .finish()
    }
}
