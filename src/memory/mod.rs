//! Memory management for mediagraph.
//!
//! # Architecture
//!
//! - [`MemorySegment`]: Trait for memory backends (heap, wrapped bytes)
//! - [`Allocator`]: Capability that produces fresh segments
//! - [`Memory`]: Cursor-tracked view over a shared segment, the unit a
//!   [`Buffer`](crate::buffer::Buffer) is built from
//!
//! # Example
//!
//! ```rust
//! use mediagraph::memory::Memory;
//!
//! let mut mem = Memory::with_capacity(16).unwrap();
//! mem.write(b"hello", None);
//! mem.consume(1);
//! assert_eq!(mem.as_slice(), b"ello");
//! ```

mod allocator;
mod heap;
mod region;
mod segment;
mod wrapped;

pub use allocator::Allocator;
pub use heap::{HeapAllocator, HeapSegment};
pub use region::Memory;
pub use segment::{MemorySegment, MemoryType};
pub use wrapped::WrappedSegment;
