//! Memory segment trait and types.

/// Type of memory backing a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryType {
    /// Heap allocation owned outright by the segment.
    Heap,
    /// Bytes owned by someone else and wrapped without copying.
    ///
    /// Releasing a wrapped segment only drops this crate's reference; the
    /// external owner decides when the bytes go away.
    Wrapped,
}

impl MemoryType {
    /// Can the bytes of this memory type be modified in place?
    #[inline]
    pub fn is_writable(&self) -> bool {
        match self {
            MemoryType::Heap => true,
            MemoryType::Wrapped => false,
        }
    }
}

/// Trait for memory segment backends.
///
/// A memory segment is a contiguous, fixed-size region of bytes. Segments are
/// shared behind `Arc` by [`Memory`](super::Memory); mutable access is only
/// handed out while a single owner holds the segment.
pub trait MemorySegment: Send + Sync {
    /// The full region as a byte slice.
    fn as_slice(&self) -> &[u8];

    /// The full region as a mutable byte slice.
    ///
    /// Returns `None` if the segment is read-only.
    fn as_mut_slice(&mut self) -> Option<&mut [u8]>;

    /// Total size of the segment in bytes.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if the segment has zero length.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The type of memory backing this segment.
    fn memory_type(&self) -> MemoryType;

    /// Alignment of the first byte, in bytes.
    fn alignment(&self) -> usize {
        1
    }
}
