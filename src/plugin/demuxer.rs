//! Contracts between the demuxer filter and container format plugins.

use crate::buffer::Buffer;
use crate::error::Result;
use crate::format::{MediaInfo, SeekMode, VideoBitstreamFormat};
use crate::memory::Allocator;
use std::sync::Arc;

/// Whether a [`DataSource`] supports random access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seekable {
    /// Any offset can be read.
    Seekable,
    /// Data can only be read in arrival order.
    Unseekable,
    /// The source is not connected yet.
    Invalid,
}

/// Byte input handed to a plugin.
///
/// Every successful [`read_at`](Self::read_at) evicts the data before the
/// end of the returned range, so plugins read forward and re-read only what
/// they have not consumed.
pub trait DataSource: Send + Sync {
    /// Read exactly `len` bytes at `offset`.
    ///
    /// Near the end of the stream the buffer may be shorter.
    ///
    /// # Errors
    ///
    /// - [`Error::NotEnoughData`](crate::Error::NotEnoughData): the range is
    ///   not available yet while headers are parsed.
    /// - [`Error::EndOfStream`](crate::Error::EndOfStream): the range is not
    ///   available while frames are read.
    /// - [`Error::WrongState`](crate::Error::WrongState): the filter is not
    ///   prepared.
    /// - [`Error::InvalidParameter`](crate::Error::InvalidParameter): `len`
    ///   is zero.
    fn read_at(&self, offset: u64, len: usize) -> Result<Buffer>;

    /// Total media size in bytes.
    fn size(&self) -> Result<u64>;

    /// Access pattern of the source.
    fn seekable(&self) -> Seekable;
}

/// Read-only view of the input used for format probing.
pub trait ProbeSource {
    /// Make `[offset, offset + size)` available, fetching it if needed.
    ///
    /// Returns false if the range cannot be provided.
    fn check_range(&self, offset: u64, size: usize) -> bool;

    /// Copy a range without consuming it.
    fn peek_range(&self, offset: u64, size: usize) -> Option<Buffer>;

    /// Fetch and copy a range in one call.
    fn probe(&self, offset: u64, size: usize) -> Option<Buffer> {
        if self.check_range(offset, size) {
            self.peek_range(offset, size)
        } else {
            None
        }
    }
}

/// A container format parser.
///
/// Lifecycle: `init` → `set_data_source` → `prepare` → `media_info` →
/// `read_frame`* → `deinit`. Methods with default bodies are optional.
pub trait DemuxerPlugin: Send {
    /// Plugin name for logs.
    fn name(&self) -> &str;

    /// Allocate internal state.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release internal state.
    fn deinit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get ready to parse.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Forget parse progress.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Parsing is about to begin.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Parsing has ended.
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Hand over the input.
    fn set_data_source(&mut self, source: Arc<dyn DataSource>) -> Result<()>;

    /// Parse headers and describe the container.
    ///
    /// May fail with [`Error::NotEnoughData`](crate::Error::NotEnoughData)
    /// and be retried once more input is available.
    fn media_info(&mut self) -> Result<MediaInfo>;

    /// Read the next frame, preferably of `track_hint`.
    ///
    /// Returns [`Error::EndOfStream`](crate::Error::EndOfStream) when no
    /// frames are left. With pushed input this may only mean the buffered
    /// bytes ran out; the call is repeated after the next push, so a
    /// partially read frame must be remembered.
    fn read_frame(&mut self, track_hint: Option<u32>) -> Result<Buffer>;

    /// Reposition to `time_us` and return the time actually reached.
    fn seek_to(&mut self, track_id: Option<u32>, time_us: i64, mode: SeekMode) -> Result<i64>;

    /// Allocator the plugin wants frame buffers from.
    fn allocator(&self) -> Option<Arc<dyn Allocator>> {
        None
    }

    /// Downmix a track to `channels` channels.
    fn set_output_channels(&mut self, _track_id: u32, _channels: u16) -> Result<()> {
        Ok(())
    }

    /// Produce a video track in `format`.
    fn set_bitstream_format(&mut self, _track_id: u32, _format: VideoBitstreamFormat) -> Result<()> {
        Ok(())
    }
}

/// Recognizes one container format and creates plugins for it.
pub trait DemuxerFactory: Send + Sync {
    /// Factory name.
    fn name(&self) -> &str;

    /// Priority among factories recognizing the same data. Higher wins.
    fn rank(&self) -> u32;

    /// Inspect the start of the input.
    ///
    /// Returns a confidence in `1..=100`, or `None` if the data is not in
    /// this format.
    fn sniff(&self, source: &dyn ProbeSource) -> Option<u8>;

    /// Create a parser instance.
    fn create(&self) -> Result<Box<dyn DemuxerPlugin>>;
}
