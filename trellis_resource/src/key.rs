// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical texture keys and opaque backend handles.

use core::fmt;
use std::sync::Arc;

/// Logical name of a texture, e.g. a URL or `tile:3/10/-2`.
///
/// Two requests with equal keys share one cache entry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureKey(Arc<str>);

impl TextureKey {
    /// Create a key from any string.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TextureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureKey({:?})", &*self.0)
    }
}

impl fmt::Display for TextureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TextureKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TextureKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

/// An opaque handle to a texture owned by the graphics backend.
///
/// Ids are assigned by [`TextureBackend::upload`](crate::TextureBackend::upload)
/// and passed back unchanged to draw and delete calls.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u64);

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({})", self.0)
    }
}
