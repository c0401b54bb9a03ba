//! Immutable Byte View
//!
//! Cached values are handed out as `ByteView`s so callers can never mutate
//! bytes that still live in a cache. Cloning a view is cheap (reference
//! counted); reading the bytes out copies them.

use std::fmt;
use std::sync::Arc;

use crate::cache::CacheValue;

// == Byte View ==
/// An immutable view of a cached value's bytes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteView {
    bts: Arc<[u8]>,
}

impl ByteView {
    /// Creates a view that takes ownership of `bts`.
    pub fn new(bts: Vec<u8>) -> Self {
        Self { bts: bts.into() }
    }

    /// Returns the logical length of the viewed bytes.
    pub fn len(&self) -> usize {
        self.bts.len()
    }

    /// Returns true if the view holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bts.is_empty()
    }

    /// Returns a fresh copy of the bytes, safe for the caller to mutate.
    pub fn byte_slice(&self) -> Vec<u8> {
        self.bts.to_vec()
    }

    /// Borrows the bytes without copying.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bts
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(bts: Vec<u8>) -> Self {
        Self::new(bts)
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bts))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteView({})", String::from_utf8_lossy(&self.bts))
    }
}

impl CacheValue for ByteView {
    fn len(&self) -> usize {
        self.bts.len()
    }
}
