//! SourceBuffer - string arena backing an event group
//!
//! All string views handed out by the arena are reference-counted slices
//! of its chunks, so dropping the arena handle never invalidates a view.

use bytes::{Bytes, BytesMut};

use crate::DEFAULT_ARENA_CAPACITY;

/// Arena owning the backing bytes of one event group
///
/// Strings are appended into a growing chunk and frozen into `Bytes`
/// views. Consecutive small strings share one allocation; a string larger
/// than the remaining chunk capacity triggers a fresh chunk.
#[derive(Debug, Default)]
pub struct SourceBuffer {
    chunk: BytesMut,
    allocated: usize,
}

impl SourceBuffer {
    /// Create an arena with the default chunk capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ARENA_CAPACITY)
    }

    /// Create an arena with a specific initial chunk capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chunk: BytesMut::with_capacity(capacity),
            allocated: 0,
        }
    }

    /// Copy a string into the arena and return a view of it
    ///
    /// The returned `Bytes` shares the chunk's refcounted allocation;
    /// it stays valid for as long as the caller holds it, independent of
    /// the arena's own lifetime.
    pub fn copy_string(&mut self, s: &[u8]) -> Bytes {
        if self.chunk.capacity() - self.chunk.len() < s.len() {
            // Freeze point: the filled prefix was already split off on
            // previous calls, so reserving here starts a new chunk.
            self.chunk
                .reserve(s.len().max(DEFAULT_ARENA_CAPACITY));
        }
        self.chunk.extend_from_slice(s);
        self.allocated += s.len();
        self.chunk.split().freeze()
    }

    /// Total bytes copied into the arena so far
    #[inline]
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_survive_the_arena() {
        let mut buffer = SourceBuffer::new();
        let a = buffer.copy_string(b"hello");
        let b = buffer.copy_string(b"world");
        drop(buffer);
        assert_eq!(&a[..], b"hello");
        assert_eq!(&b[..], b"world");
    }

    #[test]
    fn large_string_gets_its_own_chunk() {
        let mut buffer = SourceBuffer::with_capacity(8);
        let small = buffer.copy_string(b"ab");
        let big = buffer.copy_string(&[b'x'; 10_000]);
        assert_eq!(&small[..], b"ab");
        assert_eq!(big.len(), 10_000);
        assert_eq!(buffer.allocated(), 10_002);
    }
}
