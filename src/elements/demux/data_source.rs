//! Input side of the demuxer filter.
//!
//! [`DemuxInput`] owns the filter's [`DataPacker`] and knows how to fill it:
//! in pull mode by requesting the missing bytes from upstream, in push mode
//! by waiting for upstream to deliver them. [`DataSourceImpl`] exposes it to
//! plugins as a [`DataSource`].

use super::data_packer::{Availability, DataPacker, ReadMode};
use crate::buffer::Buffer;
use crate::element::{FilterState, UpstreamPort, WorkMode};
use crate::error::{Error, Result};
use crate::plugin::{DataSource, ProbeSource, Seekable};
use std::sync::{Arc, Mutex};

/// Shared input state of a demuxer filter.
pub struct DemuxInput {
    filter: String,
    packer: DataPacker,
    state: Mutex<FilterState>,
    upstream: Mutex<Option<Arc<dyn UpstreamPort>>>,
    mode: Mutex<Option<WorkMode>>,
    pull_chunk_size: usize,
}

impl DemuxInput {
    /// Create an input with no upstream.
    pub fn new(filter: impl Into<String>, pull_chunk_size: usize) -> Self {
        Self {
            filter: filter.into(),
            packer: DataPacker::new(),
            state: Mutex::new(FilterState::Null),
            upstream: Mutex::new(None),
            mode: Mutex::new(None),
            pull_chunk_size,
        }
    }

    /// The staging queue.
    pub fn packer(&self) -> &DataPacker {
        &self.packer
    }

    /// Current filter state.
    pub fn state(&self) -> FilterState {
        *self.state.lock().unwrap()
    }

    /// Set the filter state, returning the previous one.
    pub fn set_state(&self, state: FilterState) -> FilterState {
        std::mem::replace(&mut *self.state.lock().unwrap(), state)
    }

    /// Attach the upstream port.
    pub fn set_upstream(&self, port: Arc<dyn UpstreamPort>) {
        *self.upstream.lock().unwrap() = Some(port);
    }

    fn upstream(&self) -> Option<Arc<dyn UpstreamPort>> {
        self.upstream.lock().unwrap().clone()
    }

    /// Pick pull mode if upstream supports it, push mode otherwise.
    pub fn select_mode(&self) -> WorkMode {
        let mode = match self.upstream() {
            Some(port) if port.supports_pull() => WorkMode::Pull,
            _ => WorkMode::Push,
        };
        *self.mode.lock().unwrap() = Some(mode);
        tracing::debug!(filter = %self.filter, ?mode, "work mode selected");
        mode
    }

    /// Forget the work mode.
    pub fn clear_mode(&self) {
        *self.mode.lock().unwrap() = None;
    }

    /// Selected work mode, `None` before preparation.
    pub fn work_mode(&self) -> Option<WorkMode> {
        *self.mode.lock().unwrap()
    }

    /// Total media size reported by upstream.
    pub fn media_size(&self) -> Option<u64> {
        self.upstream().and_then(|port| port.media_size())
    }

    /// Make `[offset, offset + size)` readable.
    ///
    /// In pull mode this fetches exactly the missing bytes (at least
    /// `pull_chunk_size`) until the range is buffered or upstream runs dry.
    /// At end of stream the call still succeeds if some bytes at `offset`
    /// are buffered; reads are then clamped to what is left.
    ///
    /// In push mode nothing is fetched and the call only reports whether
    /// anything is buffered.
    pub fn check_range(&self, offset: u64, size: usize) -> bool {
        match self.work_mode() {
            Some(WorkMode::Pull) => self.pull_range(offset, size),
            Some(WorkMode::Push) => !self.packer.is_empty(),
            None => false,
        }
    }

    /// Whether a push-mode read of `size` bytes can be served whole, or
    /// with what is left once upstream signalled EOS.
    fn push_ready(&self, size: usize) -> bool {
        let buffered = self.packer.size();
        buffered >= size as u64 || (self.packer.is_eos() && buffered > 0)
    }

    fn pull_range(&self, offset: u64, size: usize) -> bool {
        let Some(port) = self.upstream() else {
            return false;
        };
        loop {
            let (pull_offset, missing) = match self.packer.is_data_available(offset, size) {
                Availability::Available => return true,
                Availability::Insufficient { .. } if self.packer.is_eos() => return true,
                Availability::Insufficient { next_offset } => {
                    (next_offset, (offset + size as u64 - next_offset) as usize)
                }
                Availability::Invalidated => (offset, size),
            };

            let request = missing.max(self.pull_chunk_size);
            tracing::trace!(
                filter = %self.filter,
                offset = pull_offset,
                size = request,
                "pulling from upstream"
            );
            let buffer = match port.pull_data(pull_offset, request) {
                Ok(buffer) => buffer,
                Err(Error::EndOfStream) => return self.end_of_stream(offset),
                Err(err) => {
                    tracing::warn!(filter = %self.filter, offset = pull_offset, %err, "pull failed");
                    return false;
                }
            };

            let eos = buffer.is_eos();
            if buffer.is_empty() && !eos {
                tracing::warn!(
                    filter = %self.filter,
                    offset = pull_offset,
                    "upstream returned no data"
                );
                return false;
            }
            if !buffer.is_empty() {
                if let Err(err) = self.packer.push_data(buffer, pull_offset) {
                    tracing::warn!(filter = %self.filter, %err, "dropping pulled data");
                    return false;
                }
            }
            if eos || self.packer.is_empty() {
                return self.end_of_stream(offset);
            }
        }
    }

    fn end_of_stream(&self, offset: u64) -> bool {
        let (start, end) = self.packer.window();
        if !self.packer.is_empty() && start <= offset && offset < end {
            tracing::debug!(filter = %self.filter, offset, end, "upstream exhausted");
            self.packer.set_eos();
            true
        } else {
            tracing::debug!(filter = %self.filter, offset, "upstream exhausted before offset");
            self.packer.flush();
            false
        }
    }

    /// Serve a range made readable by [`check_range`](Self::check_range).
    pub fn read(&self, offset: u64, size: usize, mode: ReadMode) -> Option<Buffer> {
        match self.work_mode()? {
            WorkMode::Pull => {
                let size = if self.packer.is_eos() {
                    let (_, end) = self.packer.window();
                    size.min(end.saturating_sub(offset) as usize)
                } else {
                    size
                };
                if size == 0 {
                    return None;
                }
                self.packer.read_range(offset, size, mode).into_buffer()
            }
            WorkMode::Push => match mode {
                ReadMode::Consume => self.packer.take_front(size),
                ReadMode::Peek => {
                    let (start, _) = self.packer.window();
                    let available = self.packer.size().saturating_sub(offset) as usize;
                    let size = size.min(available);
                    if size == 0 {
                        return None;
                    }
                    self.packer.peek_range(start + offset, size)
                }
            },
        }
    }
}

impl ProbeSource for DemuxInput {
    fn check_range(&self, offset: u64, size: usize) -> bool {
        DemuxInput::check_range(self, offset, size)
    }

    fn peek_range(&self, offset: u64, size: usize) -> Option<Buffer> {
        self.read(offset, size, ReadMode::Peek)
    }
}

impl std::fmt::Debug for DemuxInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemuxInput")
            .field("filter", &self.filter)
            .field("state", &self.state())
            .field("mode", &self.work_mode())
            .field("packer", &self.packer)
            .finish()
    }
}

/// [`DataSource`] handed to demuxer plugins.
#[derive(Debug, Clone)]
pub struct DataSourceImpl {
    input: Arc<DemuxInput>,
}

impl DataSourceImpl {
    /// Wrap a filter input.
    pub fn new(input: Arc<DemuxInput>) -> Self {
        Self { input }
    }

    fn shortfall(&self, state: FilterState) -> Error {
        match state {
            FilterState::Null => Error::WrongState,
            FilterState::ParseHeader => Error::NotEnoughData,
            FilterState::ParseFrame => Error::EndOfStream,
        }
    }
}

impl DataSource for DataSourceImpl {
    fn read_at(&self, offset: u64, len: usize) -> Result<Buffer> {
        if len == 0 {
            return Err(Error::InvalidParameter("read of zero bytes".into()));
        }
        let state = self.input.state();
        if state == FilterState::Null {
            return Err(Error::WrongState);
        }

        // Push mode serves from the front regardless of `offset`.
        let ready = match self.input.work_mode() {
            Some(WorkMode::Push) => self.input.push_ready(len),
            _ => self.input.check_range(offset, len),
        };
        if ready {
            if let Some(buffer) = self.input.read(offset, len, ReadMode::Consume) {
                return Ok(buffer);
            }
        }
        Err(self.shortfall(state))
    }

    fn size(&self) -> Result<u64> {
        self.input
            .media_size()
            .ok_or_else(|| Error::Unknown("media size not known".into()))
    }

    fn seekable(&self) -> Seekable {
        match self.input.work_mode() {
            Some(WorkMode::Pull) => Seekable::Seekable,
            Some(WorkMode::Push) => Seekable::Unseekable,
            None => Seekable::Invalid,
        }
    }
}
