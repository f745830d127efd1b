//! Heap-backed memory segment and allocator.

use super::{Allocator, MemorySegment, MemoryType};
use crate::error::{Error, Result};

/// A memory segment backed by heap allocation.
///
/// # Example
///
/// ```rust
/// use mediagraph::memory::{HeapSegment, MemorySegment};
///
/// let segment = HeapSegment::new(1024).unwrap();
/// assert_eq!(segment.len(), 1024);
/// ```
pub struct HeapSegment {
    /// The underlying allocation, possibly padded for alignment.
    /// A boxed slice never reallocates, so `start` stays aligned.
    data: Box<[u8]>,
    /// Index of the first usable byte inside `data`.
    start: usize,
    /// Usable length.
    len: usize,
    align: usize,
}

impl HeapSegment {
    /// Create a new zero-initialized heap segment.
    ///
    /// # Errors
    ///
    /// Returns an error if size is 0.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_alignment(size, 1)
    }

    /// Create a new heap segment whose first byte is aligned to `align`.
    ///
    /// # Errors
    ///
    /// Returns an error if size is 0 or `align` is not a power of 2.
    pub fn with_alignment(size: usize, align: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }
        if !align.is_power_of_two() {
            return Err(Error::AllocationFailed(
                "alignment must be a power of 2".into(),
            ));
        }

        let padded = size
            .checked_add(align - 1)
            .ok_or_else(|| Error::AllocationFailed(format!("size {} overflows", size)))?;
        let data = vec![0u8; padded].into_boxed_slice();
        let start = data.as_ptr().align_offset(align);
        if start >= align {
            return Err(Error::AllocationFailed(format!(
                "could not achieve alignment of {} bytes",
                align
            )));
        }

        Ok(Self {
            data,
            start,
            len: size,
            align,
        })
    }

    /// Take ownership of an existing vector without copying.
    ///
    /// An empty vector yields an empty segment.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            data: data.into_boxed_slice(),
            start: 0,
            len,
            align: 1,
        }
    }
}

impl MemorySegment for HeapSegment {
    fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.start + self.len]
    }

    fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.data[self.start..self.start + self.len])
    }

    fn len(&self) -> usize {
        self.len
    }

    fn memory_type(&self) -> MemoryType {
        MemoryType::Heap
    }

    fn alignment(&self) -> usize {
        self.align
    }
}

/// Allocator handing out [`HeapSegment`]s.
#[derive(Debug, Clone, Copy)]
pub struct HeapAllocator {
    align: usize,
}

impl HeapAllocator {
    /// Allocator with no alignment requirement.
    pub const fn new() -> Self {
        Self { align: 1 }
    }

    /// Allocator whose segments start on an `align`-byte boundary.
    pub const fn with_alignment(align: usize) -> Self {
        Self { align }
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for HeapAllocator {
    fn allocate(&self, capacity: usize) -> Result<Box<dyn MemorySegment>> {
        Ok(Box::new(HeapSegment::with_alignment(capacity, self.align)?))
    }

    fn memory_type(&self) -> MemoryType {
        MemoryType::Heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_segment_creation() {
        let segment = HeapSegment::new(1024).unwrap();
        assert_eq!(segment.len(), 1024);
        assert_eq!(segment.memory_type(), MemoryType::Heap);
        assert!(segment.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_heap_segment_zero_size_fails() {
        assert!(HeapSegment::new(0).is_err());
    }

    #[test]
    fn test_heap_segment_alignment() {
        let segment = HeapSegment::with_alignment(100, 64).unwrap();
        assert_eq!(segment.as_slice().as_ptr() as usize % 64, 0);
        assert_eq!(segment.len(), 100);
        assert_eq!(segment.alignment(), 64);

        assert!(HeapSegment::with_alignment(100, 3).is_err());
    }

    #[test]
    fn test_heap_segment_read_write() {
        let mut segment = HeapSegment::new(16).unwrap();
        let slice = segment.as_mut_slice().unwrap();
        slice[0] = 42;
        slice[1] = 43;
        assert_eq!(&segment.as_slice()[..2], &[42, 43]);
    }

    #[test]
    fn test_heap_allocator() {
        let allocator = HeapAllocator::with_alignment(32);
        let segment = allocator.allocate(48).unwrap();
        assert_eq!(segment.len(), 48);
        assert_eq!(segment.alignment(), 32);
        assert_eq!(allocator.memory_type(), MemoryType::Heap);
    }
}
