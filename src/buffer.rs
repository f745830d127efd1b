//! Buffer type passed between filters.

use crate::error::Result;
use crate::memory::{Allocator, Memory};
use crate::metadata::{BufferFlags, Metadata};
use bytes::Bytes;
use smallvec::SmallVec;

/// A buffer containing one or more memory regions and metadata.
///
/// The first memory region holds the payload; further regions carry
/// side data a plugin wants to keep next to it.
///
/// # Shared ownership
///
/// Buffers are cheap to clone: memory segments are reference counted, so the
/// data packer, a plugin and downstream ports can hold the same bytes at the
/// same time. Cursor changes on one clone (for example
/// [`consume`](Self::consume)) never affect another.
///
/// # Example
///
/// ```rust
/// use mediagraph::buffer::Buffer;
///
/// let buffer = Buffer::from_bytes(&b"payload"[..]);
/// let clone = buffer.clone();
/// assert_eq!(buffer.as_bytes().as_ptr(), clone.as_bytes().as_ptr());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Buffer {
    memories: SmallVec<[Memory; 1]>,
    metadata: Metadata,
}

impl Buffer {
    /// Create a buffer from a payload memory and metadata.
    pub fn new(memory: Memory, metadata: Metadata) -> Self {
        let mut memories = SmallVec::new();
        memories.push(memory);
        Self { memories, metadata }
    }

    /// Create a buffer with no memory at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an empty buffer flagged end-of-stream.
    pub fn eos() -> Self {
        Self {
            memories: SmallVec::new(),
            metadata: Metadata::new().with_eos(),
        }
    }

    /// Wrap externally owned bytes without copying.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::new(Memory::wrap(data), Metadata::new())
    }

    /// Take ownership of a filled vector.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::new(Memory::from_vec(data), Metadata::new())
    }

    /// Allocate an empty, writable buffer.
    pub fn alloc(allocator: &dyn Allocator, capacity: usize) -> Result<Self> {
        Ok(Self::new(
            Memory::allocate(allocator, capacity)?,
            Metadata::new(),
        ))
    }

    /// Append another memory region.
    pub fn add_memory(&mut self, memory: Memory) {
        self.memories.push(memory);
    }

    /// The payload memory, if any.
    pub fn memory(&self) -> Option<&Memory> {
        self.memories.first()
    }

    /// Mutable payload memory, if any.
    pub fn memory_mut(&mut self) -> Option<&mut Memory> {
        self.memories.first_mut()
    }

    /// All memory regions.
    pub fn memories(&self) -> &[Memory] {
        &self.memories
    }

    /// Payload bytes (empty if there is no memory).
    pub fn as_bytes(&self) -> &[u8] {
        self.memory().map(Memory::as_slice).unwrap_or(&[])
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.memory().map_or(0, Memory::size)
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the first `n` payload bytes.
    pub fn consume(&mut self, n: usize) {
        if let Some(memory) = self.memory_mut() {
            memory.consume(n);
        }
    }

    /// Get a reference to the buffer's metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get a mutable reference to the buffer's metadata.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Replace the metadata, builder style.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Presentation timestamp in microseconds.
    pub fn pts(&self) -> i64 {
        self.metadata.pts
    }

    /// Decode timestamp in microseconds.
    pub fn dts(&self) -> i64 {
        self.metadata.dts
    }

    /// Track this buffer belongs to.
    pub fn track_id(&self) -> u32 {
        self.metadata.track_id
    }

    /// Buffer flags.
    pub fn flags(&self) -> BufferFlags {
        self.metadata.flags
    }

    /// Check the end-of-stream flag.
    pub fn is_eos(&self) -> bool {
        self.metadata.is_eos()
    }
}
