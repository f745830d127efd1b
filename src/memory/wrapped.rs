//! Read-only segment over externally owned bytes.

use super::{MemorySegment, MemoryType};
use bytes::Bytes;

/// A segment that borrows its bytes from an external owner.
///
/// The bytes are reference counted by [`Bytes`]; dropping the segment never
/// frees memory the external owner still uses.
pub struct WrappedSegment {
    data: Bytes,
}

impl WrappedSegment {
    /// Wrap the given bytes without copying.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// The wrapped bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl MemorySegment for WrappedSegment {
    fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn memory_type(&self) -> MemoryType {
        MemoryType::Wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_segment_is_read_only() {
        let mut segment = WrappedSegment::new(&b"external"[..]);
        assert_eq!(segment.len(), 8);
        assert_eq!(segment.as_slice(), b"external");
        assert!(segment.as_mut_slice().is_none());
        assert!(!segment.memory_type().is_writable());
    }

    #[test]
    fn test_wrapped_segment_shares_bytes() {
        let owner = Bytes::from_static(b"shared payload");
        let segment = WrappedSegment::new(owner.clone());
        assert_eq!(segment.bytes().as_ptr(), owner.as_ptr());
    }
}
