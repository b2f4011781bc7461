// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for texture loading and tile streaming.

/// Why a texture load did not produce an image.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// Reading the source failed.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path or URL that was being read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The load was cancelled before it finished.
    #[error("load cancelled")]
    Cancelled,

    /// The executor dropped the decode task without running it.
    #[error("decode task was dropped before it ran")]
    Dropped,

    /// The source descriptor names something this decoder cannot fetch.
    #[error("unsupported source: {0}")]
    Unsupported(String),
}

impl LoadError {
    /// Build a [`LoadError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`LoadError::Unsupported`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

/// Capacity guards for the tile layer.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileError {
    /// The visible rectangle would need more tiles than allowed in one frame.
    #[error("{requested} tiles visible, limit is {limit}")]
    TooManyTiles {
        /// Number of tiles the rectangle covers.
        requested: usize,
        /// Configured upper bound.
        limit: usize,
    },

    /// The visible rectangle lies beyond the addressable tile coordinates.
    #[error("visible rectangle is outside the tile grid at level {level}")]
    OutOfRange {
        /// Level the rectangle was tiled at.
        level: i32,
    },
}
