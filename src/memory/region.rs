//! Cursor-tracked view over a memory segment.

use super::{Allocator, HeapSegment, MemorySegment, MemoryType, WrappedSegment};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;

/// A byte region with consume and write cursors.
///
/// All positions taken and returned by `Memory` are relative to the consume
/// cursor: after [`consume`](Self::consume)`(n)` the byte previously at
/// position `n` is at position 0. The readable bytes are `[0, size)` and the
/// writable room is `[0, capacity)`; `size <= capacity` always holds.
///
/// Cloning is cheap: the backing segment is shared. While shared, neither
/// clone can write (see [`writable_addr`](Self::writable_addr)).
#[derive(Clone)]
pub struct Memory {
    segment: Arc<dyn MemorySegment>,
    /// Consume cursor (absolute index into the segment).
    head: usize,
    /// Write cursor (absolute index into the segment).
    tail: usize,
}

impl Memory {
    /// Create an empty memory over a segment.
    pub fn new(segment: Box<dyn MemorySegment>) -> Self {
        Self {
            segment: Arc::from(segment),
            head: 0,
            tail: 0,
        }
    }

    /// Allocate an empty heap memory with the given capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self::new(Box::new(HeapSegment::new(capacity)?)))
    }

    /// Allocate an empty memory from an allocator.
    pub fn allocate(allocator: &dyn Allocator, capacity: usize) -> Result<Self> {
        Ok(Self::new(allocator.allocate(capacity)?))
    }

    /// Take ownership of a filled vector. Size equals capacity.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            segment: Arc::new(HeapSegment::from_vec(data)),
            head: 0,
            tail: len,
        }
    }

    /// Wrap externally owned bytes. The result is full and read-only.
    pub fn wrap(data: impl Into<Bytes>) -> Self {
        let segment = WrappedSegment::new(data);
        let len = segment.len();
        Self {
            segment: Arc::new(segment),
            head: 0,
            tail: len,
        }
    }

    /// Bytes that can be held from the consume cursor onward.
    pub fn capacity(&self) -> usize {
        self.segment.len() - self.head
    }

    /// Number of readable bytes.
    pub fn size(&self) -> usize {
        self.tail - self.head
    }

    /// Returns true if nothing is readable.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The type of the backing segment.
    pub fn memory_type(&self) -> MemoryType {
        self.segment.memory_type()
    }

    /// Alignment of the backing segment.
    pub fn alignment(&self) -> usize {
        self.segment.alignment()
    }

    /// The readable bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.segment.as_slice()[self.head..self.tail]
    }

    /// Readable bytes starting at `position`.
    ///
    /// Returns `None` if `position > capacity`. A position between `size` and
    /// `capacity` yields an empty slice.
    pub fn read_only_data(&self, position: usize) -> Option<&[u8]> {
        if position > self.capacity() {
            return None;
        }
        let start = self.head + position;
        let end = self.tail.max(start);
        Some(&self.segment.as_slice()[start..end])
    }

    /// Mutable room of `len` bytes at `position`.
    ///
    /// Returns `None` if the range exceeds the capacity, the segment is
    /// read-only, or the segment is shared with another `Memory`. Commit the
    /// written bytes with [`update_size`](Self::update_size).
    pub fn writable_addr(&mut self, len: usize, position: usize) -> Option<&mut [u8]> {
        let end = position.checked_add(len)?;
        if end > self.capacity() {
            return None;
        }
        let start = self.head + position;
        let slice = Arc::get_mut(&mut self.segment)?.as_mut_slice()?;
        Some(&mut slice[start..start + len])
    }

    /// Set the write cursor to `position + len` after writing through
    /// [`writable_addr`](Self::writable_addr).
    pub fn update_size(&mut self, len: usize, position: usize) -> Result<()> {
        match position.checked_add(len) {
            Some(end) if end <= self.capacity() => {
                self.tail = self.head + end;
                Ok(())
            }
            _ => Err(Error::InvalidParameter(format!(
                "range {}+{} exceeds capacity {}",
                position,
                len,
                self.capacity()
            ))),
        }
    }

    /// Write `data` at `position`, or append at the write cursor when `None`.
    ///
    /// The write is truncated to the remaining capacity. The write cursor
    /// ends up right after the written bytes. Returns the number of bytes
    /// written (0 for read-only or shared memory).
    pub fn write(&mut self, data: &[u8], position: Option<usize>) -> usize {
        let start = position.unwrap_or_else(|| self.size());
        let capacity = self.capacity();
        if start > capacity {
            return 0;
        }
        let len = data.len().min(capacity - start);
        let Some(dst) = self.writable_addr(len, start) else {
            return 0;
        };
        dst.copy_from_slice(&data[..len]);
        self.tail = self.head + start + len;
        len
    }

    /// Copy readable bytes starting at `position` (0 when `None`) into `out`.
    ///
    /// Returns the number of bytes copied.
    pub fn read(&self, out: &mut [u8], position: Option<usize>) -> usize {
        let start = position.unwrap_or(0);
        let size = self.size();
        if start >= size {
            return 0;
        }
        let len = out.len().min(size - start);
        out[..len].copy_from_slice(&self.as_slice()[start..start + len]);
        len
    }

    /// Drop the first `n` readable bytes without copying anything.
    ///
    /// Consuming more than `size` bytes empties the memory.
    pub fn consume(&mut self, n: usize) {
        self.head += n.min(self.size());
    }

    /// Forget all content and cursors.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .field("memory_type", &self.memory_type())
            .finish()
    }
}
