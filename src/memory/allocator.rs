//! Allocator capability.

use super::{MemorySegment, MemoryType};
use crate::error::Result;

/// Something that can hand out fresh memory segments.
///
/// Plugins may expose their own allocator (for example one backed by
/// surfaces or shared memory); it is passed downstream during port
/// negotiation so consumers can allocate compatible buffers.
pub trait Allocator: Send + Sync {
    /// Allocate a segment of exactly `capacity` bytes.
    fn allocate(&self, capacity: usize) -> Result<Box<dyn MemorySegment>>;

    /// The type of memory this allocator produces.
    fn memory_type(&self) -> MemoryType;
}

impl std::fmt::Debug for dyn Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("memory_type", &self.memory_type())
            .finish()
    }
}
