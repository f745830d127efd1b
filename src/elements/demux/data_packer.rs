//! Byte-range staging queue between upstream data and a format plugin.
//!
//! The packer holds buffers that together form one contiguous window of the
//! input stream, `[base_offset, base_offset + size)`. Plugins ask for
//! arbitrary `(offset, size)` ranges; ranges inside one queued buffer are
//! copied directly, ranges spanning several buffers are stitched into one
//! fresh buffer.
//!
//! Any request that starts outside the window discards the whole window:
//! the caller refetches from the requested offset instead of trying to reuse
//! part of the old data.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::metadata::Metadata;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of an availability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The whole range is buffered.
    Available,
    /// The range starts inside the window but runs past its end.
    /// `next_offset` is the first missing byte.
    Insufficient {
        /// Offset at which more data must be supplied.
        next_offset: u64,
    },
    /// The range started outside the window; the window was flushed and
    /// data must be supplied from the requested offset.
    Invalidated,
}

impl Availability {
    /// Returns true for [`Availability::Available`].
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// Offset from which the caller has to supply data for a request at
    /// `requested`, or `None` if nothing is missing.
    pub fn next_offset(&self, requested: u64) -> Option<u64> {
        match self {
            Availability::Available => None,
            Availability::Insufficient { next_offset } => Some(*next_offset),
            Availability::Invalidated => Some(requested),
        }
    }
}

/// Whether a range read keeps or evicts the bytes it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Copy the range and leave the window untouched.
    Peek,
    /// Copy the range, then drop everything up to its end.
    Consume,
}

/// Outcome of [`DataPacker::read_range`].
#[derive(Debug)]
pub enum RangeRead {
    /// The range, stitched into one buffer.
    Available(Buffer),
    /// See [`Availability::Insufficient`].
    Insufficient {
        /// Offset at which more data must be supplied.
        next_offset: u64,
    },
    /// See [`Availability::Invalidated`].
    Invalidated,
}

impl RangeRead {
    /// The buffer, if the range was served.
    pub fn into_buffer(self) -> Option<Buffer> {
        match self {
            RangeRead::Available(buffer) => Some(buffer),
            _ => None,
        }
    }
}

#[derive(Default)]
struct PackerState {
    queue: VecDeque<Buffer>,
    base_offset: u64,
    total_size: u64,
    pts: i64,
    dts: i64,
    eos: bool,
}

impl PackerState {
    fn window_end(&self) -> u64 {
        self.base_offset + self.total_size
    }

    fn flush(&mut self) {
        self.queue.clear();
        self.base_offset = 0;
        self.total_size = 0;
        self.pts = 0;
        self.dts = 0;
        self.eos = false;
    }

    fn refresh_timestamps(&mut self) {
        if let Some(front) = self.queue.front() {
            self.pts = front.pts();
            self.dts = front.dts();
        }
    }

    fn availability(&mut self, offset: u64, size: usize) -> Availability {
        if self.queue.is_empty() || offset < self.base_offset || offset >= self.window_end() {
            tracing::debug!(
                offset,
                size,
                base_offset = self.base_offset,
                total_size = self.total_size,
                "range outside buffered window, flushing"
            );
            self.flush();
            return Availability::Invalidated;
        }

        let wanted = offset + size as u64;
        let mut end = self.base_offset;
        for buffer in &self.queue {
            end += buffer.len() as u64;
            if end >= wanted {
                return Availability::Available;
            }
        }
        Availability::Insufficient { next_offset: end }
    }

    /// Copy `[offset, offset + size)` out of the queue.
    ///
    /// The range must be available.
    fn copy_range(&self, offset: u64, size: usize) -> Buffer {
        let mut skip = (offset - self.base_offset) as usize;
        let mut buffers = self.queue.iter();

        // Find the first contributing buffer.
        let first = loop {
            match buffers.next() {
                Some(buffer) if skip >= buffer.len() => skip -= buffer.len(),
                Some(buffer) => break buffer,
                None => unreachable!("range checked against window"),
            }
        };
        let metadata = Metadata::new().with_timestamps(first.pts(), first.dts());
        let head = &first.as_bytes()[skip..];

        if head.len() >= size {
            return Buffer::new(Memory::from_vec(head[..size].to_vec()), metadata);
        }

        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(head);
        for buffer in buffers {
            let remaining = size - data.len();
            let bytes = buffer.as_bytes();
            if bytes.len() >= remaining {
                data.extend_from_slice(&bytes[..remaining]);
                break;
            }
            data.extend_from_slice(bytes);
        }
        debug_assert_eq!(data.len(), size);
        Buffer::new(Memory::from_vec(data), metadata)
    }

    /// Drop everything before `end`, trimming the buffer that straddles it.
    fn evict_until(&mut self, end: u64) {
        while let Some(front) = self.queue.front_mut() {
            let front_end = self.base_offset + front.len() as u64;
            if front_end <= end {
                self.total_size -= front.len() as u64;
                self.base_offset = front_end;
                self.queue.pop_front();
                continue;
            }
            let partial = end.saturating_sub(self.base_offset);
            if partial > 0 {
                front.consume(partial as usize);
                self.total_size -= partial;
                self.base_offset = end;
            }
            break;
        }
        if self.queue.is_empty() {
            self.base_offset = end;
        }
        self.refresh_timestamps();
    }

    fn read_range(&mut self, offset: u64, size: usize, mode: ReadMode) -> RangeRead {
        match self.availability(offset, size) {
            Availability::Available => {}
            Availability::Insufficient { next_offset } => {
                return RangeRead::Insufficient { next_offset };
            }
            Availability::Invalidated => return RangeRead::Invalidated,
        }

        let buffer = self.copy_range(offset, size);
        if mode == ReadMode::Consume {
            self.evict_until(offset + size as u64);
        }
        RangeRead::Available(buffer)
    }
}

/// Ordered queue of input buffers served as one contiguous byte range.
///
/// All operations lock one mutex; [`size`](Self::size) is mirrored in an
/// atomic so it can be probed without taking the lock.
///
/// # Example
///
/// ```rust
/// use mediagraph::buffer::Buffer;
/// use mediagraph::elements::demux::DataPacker;
///
/// let packer = DataPacker::new();
/// packer.push_data(Buffer::from_bytes(&b"abc"[..]), 0).unwrap();
/// packer.push_data(Buffer::from_bytes(&b"defg"[..]), 3).unwrap();
///
/// let range = packer.get_range(2, 3).unwrap();
/// assert_eq!(range.as_bytes(), b"cde");
/// assert_eq!(packer.base_offset(), 5);
/// ```
#[derive(Default)]
pub struct DataPacker {
    state: Mutex<PackerState>,
    total_size: AtomicU64,
}

impl DataPacker {
    /// Create an empty packer.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PackerState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        let result = f(&mut state);
        self.total_size.store(state.total_size, Ordering::Release);
        result
    }

    /// Append a buffer that starts at stream offset `offset`.
    ///
    /// On an empty packer the offset becomes the new window start and the
    /// buffer's timestamps become current. Otherwise `offset` must equal the
    /// current window end. Empty buffers are ignored.
    ///
    /// # Errors
    ///
    /// [`Error::NonContiguousPush`] if the buffer would leave a gap or
    /// overlap the window.
    pub fn push_data(&self, buffer: Buffer, offset: u64) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        self.with_state(|state| {
            if state.queue.is_empty() {
                state.base_offset = offset;
                state.pts = buffer.pts();
                state.dts = buffer.dts();
            } else if offset != state.window_end() {
                return Err(Error::NonContiguousPush {
                    expected: state.window_end(),
                    actual: offset,
                });
            }
            state.total_size += buffer.len() as u64;
            tracing::trace!(
                offset,
                len = buffer.len(),
                total_size = state.total_size,
                "buffer queued"
            );
            state.queue.push_back(buffer);
            Ok(())
        })
    }

    /// Mark that no more data will arrive.
    pub fn set_eos(&self) {
        self.with_state(|state| state.eos = true);
    }

    /// Returns true once [`set_eos`](Self::set_eos) was called and no flush
    /// happened since.
    pub fn is_eos(&self) -> bool {
        self.state.lock().unwrap().eos
    }

    /// Drop all queued data and reset offsets, timestamps and EOS.
    pub fn flush(&self) {
        self.with_state(PackerState::flush);
    }

    /// Check whether `[offset, offset + size)` is fully buffered.
    ///
    /// A request starting outside the window flushes the packer and returns
    /// [`Availability::Invalidated`].
    pub fn is_data_available(&self, offset: u64, size: usize) -> Availability {
        self.with_state(|state| state.availability(offset, size))
    }

    /// Check availability and serve the range in one step.
    pub fn read_range(&self, offset: u64, size: usize, mode: ReadMode) -> RangeRead {
        self.with_state(|state| state.read_range(offset, size, mode))
    }

    /// Copy a buffered range without evicting anything.
    ///
    /// Returns `None` if the range is not fully buffered.
    pub fn peek_range(&self, offset: u64, size: usize) -> Option<Buffer> {
        self.read_range(offset, size, ReadMode::Peek).into_buffer()
    }

    /// Copy a buffered range and evict everything up to its end.
    ///
    /// Afterwards the window starts at `offset + size`. Returns `None` if
    /// the range is not fully buffered.
    pub fn get_range(&self, offset: u64, size: usize) -> Option<Buffer> {
        self.read_range(offset, size, ReadMode::Consume).into_buffer()
    }

    /// Serve up to `size` bytes from the front of the window, ignoring
    /// stream offsets. Returns `None` when nothing is buffered.
    pub fn take_front(&self, size: usize) -> Option<Buffer> {
        self.front_range(size, ReadMode::Consume)
    }

    /// Like [`take_front`](Self::take_front) without evicting.
    pub fn peek_front(&self, size: usize) -> Option<Buffer> {
        self.front_range(size, ReadMode::Peek)
    }

    fn front_range(&self, size: usize, mode: ReadMode) -> Option<Buffer> {
        self.with_state(|state| {
            if state.queue.is_empty() || size == 0 {
                return None;
            }
            let len = (size as u64).min(state.total_size) as usize;
            let offset = state.base_offset;
            state.read_range(offset, len, mode).into_buffer()
        })
    }

    /// Stream offset of the first buffered byte.
    pub fn base_offset(&self) -> u64 {
        self.state.lock().unwrap().base_offset
    }

    /// The buffered window as `(start, end)` stream offsets.
    pub fn window(&self) -> (u64, u64) {
        let state = self.state.lock().unwrap();
        (state.base_offset, state.window_end())
    }

    /// Number of buffered bytes. Lock-free.
    pub fn size(&self) -> u64 {
        self.total_size.load(Ordering::Acquire)
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// `(pts, dts)` of the buffer at the front of the window.
    pub fn timestamps(&self) -> (i64, i64) {
        let state = self.state.lock().unwrap();
        (state.pts, state.dts)
    }
}

impl fmt::Debug for DataPacker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        let mut offset = state.base_offset;
        let buffers: Vec<(u64, usize)> = state
            .queue
            .iter()
            .map(|buffer| {
                let entry = (offset, buffer.len());
                offset += buffer.len() as u64;
                entry
            })
            .collect();
        f.debug_struct("DataPacker")
            .field("base_offset", &state.base_offset)
            .field("total_size", &state.total_size)
            .field("pts", &state.pts)
            .field("dts", &state.dts)
            .field("eos", &state.eos)
            .field("buffers", &buffers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERN: &[u8] = b"1234567890abcdefghijklmnopqrstuvwxyz";

    fn packer_with(chunks: &[&[u8]], start: u64) -> DataPacker {
        let packer = DataPacker::new();
        let mut offset = start;
        for chunk in chunks {
            packer
                .push_data(Buffer::from_vec(chunk.to_vec()), offset)
                .unwrap();
            offset += chunk.len() as u64;
        }
        packer
    }

    #[test]
    fn test_single_buffer_range() {
        let packer = packer_with(&[&PATTERN[..10]], 0);

        assert_eq!(packer.is_data_available(3, 2), Availability::Available);
        let out = packer.get_range(3, 2).unwrap();
        assert_eq!(out.as_bytes(), b"45");
        assert_eq!(packer.base_offset(), 5);
        assert_eq!(packer.size(), 5);
    }

    #[test]
    fn test_multi_buffer_stitching() {
        let packer = packer_with(&[&PATTERN[..3], &PATTERN[3..7], &PATTERN[7..12]], 0);

        let out = packer.get_range(2, 6).unwrap();
        assert_eq!(out.as_bytes(), &PATTERN[2..8]);
        assert_eq!(packer.base_offset(), 8);
        assert_eq!(packer.size(), 4);

        let rest = packer.get_range(8, 4).unwrap();
        assert_eq!(rest.as_bytes(), &PATTERN[8..12]);
        assert!(packer.is_empty());
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let packer = packer_with(&[&PATTERN[..4], &PATTERN[4..9]], 100);

        let peeked = packer.peek_range(102, 5).unwrap();
        assert_eq!(peeked.as_bytes(), &PATTERN[2..7]);
        assert_eq!(packer.base_offset(), 100);
        assert_eq!(packer.size(), 9);

        let again = packer.peek_range(102, 5).unwrap();
        assert_eq!(again.as_bytes(), peeked.as_bytes());
    }

    #[test]
    fn test_insufficient_reports_next_offset() {
        let packer = packer_with(&[&PATTERN[..4], &PATTERN[4..6]], 10);

        assert_eq!(
            packer.is_data_available(12, 10),
            Availability::Insufficient { next_offset: 16 }
        );
        assert!(packer.get_range(12, 10).is_none());
        // Nothing was evicted by the failed read.
        assert_eq!(packer.size(), 6);
    }

    #[test]
    fn test_out_of_window_request_flushes() {
        let packer = packer_with(&[&PATTERN[..8]], 20);

        assert_eq!(packer.is_data_available(10, 2), Availability::Invalidated);
        assert_eq!(packer.size(), 0);

        let packer = packer_with(&[&PATTERN[..8]], 20);
        assert_eq!(packer.is_data_available(28, 1), Availability::Invalidated);
        assert!(packer.is_empty());
        assert_eq!(packer.base_offset(), 0);
    }

    #[test]
    fn test_flush_resets_everything() {
        let packer = packer_with(&[&PATTERN[..8]], 20);
        packer.set_eos();
        packer.flush();

        assert_eq!(packer.size(), 0);
        assert_eq!(packer.base_offset(), 0);
        assert_eq!(packer.timestamps(), (0, 0));
        assert!(!packer.is_eos());
        assert!(!packer.is_data_available(0, 1).is_available());
    }

    #[test]
    fn test_non_contiguous_push_rejected() {
        let packer = packer_with(&[&PATTERN[..4]], 0);
        let err = packer
            .push_data(Buffer::from_vec(PATTERN[4..8].to_vec()), 6)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NonContiguousPush {
                expected: 4,
                actual: 6
            }
        ));
        assert_eq!(packer.size(), 4);
    }

    #[test]
    fn test_empty_push_ignored() {
        let packer = DataPacker::new();
        packer.push_data(Buffer::empty(), 42).unwrap();
        assert!(packer.is_empty());
        assert_eq!(packer.base_offset(), 0);
    }

    #[test]
    fn test_timestamps_follow_front_buffer() {
        let packer = DataPacker::new();
        let first = Buffer::from_vec(PATTERN[..4].to_vec())
            .with_metadata(Metadata::new().with_timestamps(100, 90));
        let second = Buffer::from_vec(PATTERN[4..8].to_vec())
            .with_metadata(Metadata::new().with_timestamps(200, 190));
        packer.push_data(first, 0).unwrap();
        packer.push_data(second, 4).unwrap();
        assert_eq!(packer.timestamps(), (100, 90));

        let out = packer.get_range(2, 4).unwrap();
        assert_eq!((out.pts(), out.dts()), (100, 90));
        assert_eq!(packer.timestamps(), (200, 190));

        let tail = packer.peek_range(6, 2).unwrap();
        assert_eq!((tail.pts(), tail.dts()), (200, 190));
    }

    #[test]
    fn test_get_range_discards_skipped_prefix() {
        let packer = packer_with(&[&PATTERN[..5], &PATTERN[5..10]], 0);

        let out = packer.get_range(3, 4).unwrap();
        assert_eq!(out.as_bytes(), &PATTERN[3..7]);
        let (start, end) = packer.window();
        assert_eq!((start, end), (7, 10));
        assert_eq!(packer.size(), 3);
    }

    #[test]
    fn test_take_front_ignores_offsets() {
        let packer = packer_with(&[&PATTERN[..3], &PATTERN[3..6]], 500);

        let peeked = packer.peek_front(4).unwrap();
        assert_eq!(peeked.as_bytes(), &PATTERN[..4]);

        let out = packer.take_front(4).unwrap();
        assert_eq!(out.as_bytes(), &PATTERN[..4]);
        let out = packer.take_front(100).unwrap();
        assert_eq!(out.as_bytes(), &PATTERN[4..6]);
        assert!(packer.take_front(1).is_none());
    }

    #[test]
    fn test_read_range_variants() {
        let packer = packer_with(&[&PATTERN[..6]], 0);

        assert!(matches!(
            packer.read_range(4, 4, ReadMode::Peek),
            RangeRead::Insufficient { next_offset: 6 }
        ));
        assert!(matches!(
            packer.read_range(1, 2, ReadMode::Consume),
            RangeRead::Available(_)
        ));
        assert!(matches!(
            packer.read_range(0, 1, ReadMode::Peek),
            RangeRead::Invalidated
        ));
    }

    #[test]
    fn test_round_trip_every_range() {
        let chunks: [&[u8]; 4] = [&PATTERN[..5], &PATTERN[5..6], &PATTERN[6..17], &PATTERN[17..]];
        for offset in 0..PATTERN.len() {
            for size in 1..=(PATTERN.len() - offset) {
                let packer = packer_with(&chunks, 0);
                let out = packer.get_range(offset as u64, size).unwrap();
                assert_eq!(out.as_bytes(), &PATTERN[offset..offset + size]);
                assert_eq!(packer.base_offset(), (offset + size) as u64);
                assert_eq!(packer.size(), (PATTERN.len() - offset - size) as u64);
            }
        }
    }

    #[test]
    fn test_debug_lists_buffers() {
        let packer = packer_with(&[&PATTERN[..3], &PATTERN[3..7]], 10);
        let text = format!("{:?}", packer);
        assert!(text.contains("(10, 3)"));
        assert!(text.contains("(13, 4)"));
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        use std::sync::Arc;

        let packer = Arc::new(DataPacker::new());
        let producer = {
            let packer = Arc::clone(&packer);
            std::thread::spawn(move || {
                for (i, chunk) in PATTERN.chunks(4).enumerate() {
                    packer
                        .push_data(Buffer::from_vec(chunk.to_vec()), (i * 4) as u64)
                        .unwrap();
                }
            })
        };
        producer.join().unwrap();

        let mut collected = Vec::new();
        while let Some(buffer) = packer.take_front(5) {
            collected.extend_from_slice(buffer.as_bytes());
        }
        assert_eq!(collected, PATTERN);
    }
}
