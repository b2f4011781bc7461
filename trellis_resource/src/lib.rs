// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Resource: texture lifetimes for a retained scene.
//!
//! - [`TextureCache::load_or_get`] hands out a [`TextureRef`] per request.
//!   Requests for the same [`TextureKey`] share one entry, so concurrent
//!   requests decode and upload once.
//! - Decoding runs on an [`Executor`]; finished loads are applied by
//!   [`TextureCache::maintain`] at the start of a frame, which is also where
//!   released GPU textures are deleted.
//! - [`TextureRef`] is an owning reference. Dropping the last one frees the
//!   texture, or cancels its load if it has not arrived yet.
//! - Failed loads resolve to a shared 1×1 white placeholder, which also
//!   serves solid fills so they batch with each other.
//! - [`TileCache`] streams a tile pyramid through the same cache with an LRU
//!   budget.
//!
//! ```
//! use trellis_resource::{
//!     DecodedImage, InlineExecutor, SourceDescriptor, TextureBackend, TextureCache, TextureId,
//!     TextureState,
//! };
//!
//! #[derive(Default)]
//! struct Gpu(u64);
//!
//! impl TextureBackend for Gpu {
//!     fn upload(&mut self, _image: &DecodedImage) -> TextureId {
//!         self.0 += 1;
//!         TextureId(self.0)
//!     }
//!     fn delete(&mut self, _id: TextureId) {}
//! }
//!
//! let mut gpu = Gpu::default();
//! let cache = TextureCache::builder().executor(InlineExecutor).build(&mut gpu);
//! let atlas = SourceDescriptor::Raster(DecodedImage::solid(4, 4, [0, 0, 0, 255]));
//! let a = cache.load_or_get("atlas:0", atlas.clone());
//! let b = cache.load_or_get("atlas:0", atlas);
//! assert_eq!(a.resolve(), TextureState::Pending);
//!
//! cache.maintain(&mut gpu);
//! assert_eq!(a.resolve(), b.resolve());
//! assert_eq!(a.use_count(), 2);
//! ```

pub mod backend;
pub mod cache;
pub mod clock;
pub mod decode;
pub mod error;
pub mod executor;
pub mod key;
pub mod tiles;

pub use backend::TextureBackend;
pub use cache::{
    MaintainReport, TextureCache, TextureCacheBuilder, TextureCacheConfig, TextureRef,
    TextureState,
};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use decode::{DecodedImage, Decoder, FileDecoder, SourceDescriptor, decode_image};
pub use error::{LoadError, TileError};
pub use executor::{CancelToken, DeferredExecutor, Executor, InlineExecutor, Task, ThreadExecutor};
pub use key::{TextureId, TextureKey};
pub use tiles::{TileCache, TileCacheConfig, TileCoord, TileGrid, TileSource};
