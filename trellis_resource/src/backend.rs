// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The slice of the graphics backend the texture cache needs.

use crate::decode::DecodedImage;
use crate::key::TextureId;

/// Uploads and frees GPU textures.
///
/// Called only from [`TextureCache::new`](crate::TextureCache) and
/// [`TextureCache::maintain`](crate::TextureCache::maintain), on the frame thread.
pub trait TextureBackend {
    /// Upload `image` and return a handle for it.
    fn upload(&mut self, image: &DecodedImage) -> TextureId;

    /// Free a texture. Each id returned by `upload` is passed here at most once.
    fn delete(&mut self, id: TextureId);
}
