//! Immutable view over cached bytes

use std::fmt;

use bytes::Bytes;

/// Immutable byte value held by the cache.
///
/// Cloning is cheap (reference counted). Nothing handed out by a `ByteView`
/// can be used to mutate the cached data: [`ByteView::byte_slice`] returns a
/// fresh copy and [`ByteView::as_slice`] is a shared borrow.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    b: Bytes,
}

impl ByteView {
    /// Create a view by copying `data`
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            b: Bytes::copy_from_slice(data),
        }
    }

    /// Length of the view in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.b.len()
    }

    /// Check if the view holds no bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Return a copy of the data as an owned vector
    pub fn byte_slice(&self) -> Vec<u8> {
        self.b.to_vec()
    }

    /// Borrow the data
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.b
    }

    /// Cheap handle on the underlying buffer, for zero-copy writes
    pub fn to_bytes(&self) -> Bytes {
        self.b.clone()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self { b: Bytes::from(data) }
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        Self::copy_from_slice(data)
    }
}

impl From<String> for ByteView {
    fn from(s: String) -> Self {
        Self::from(s.into_bytes())
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::copy_from_slice(s.as_bytes())
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.b))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("len", &self.len())
            .field("data", &String::from_utf8_lossy(&self.b))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
