// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The graphics backend seam and a recording backend without a GPU.

use std::collections::HashMap;

use kurbo::Rect;
use trellis_resource::{DecodedImage, TextureBackend, TextureId};

use crate::batch::DrawCall;

/// A GPU (or software) target that can hold textures and draw quads.
pub trait GraphicsBackend: TextureBackend {
    /// Submit one batched draw.
    fn draw(&mut self, call: &DrawCall<'_>);
}

/// Summary of one draw call seen by [`HeadlessBackend`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw {
    /// Texture sampled.
    pub texture: TextureId,
    /// Number of quads.
    pub quads: usize,
    /// Number of indices.
    pub indices: usize,
    /// Scissor rectangle.
    pub scissor: Option<Rect>,
    /// Tint of the first vertex.
    pub first_color: [f32; 4],
    /// First index value, which is always relative to the call's vertices.
    pub first_index: u32,
}

/// Keeps textures as sizes and records draw calls. Used by tests and demos.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    textures: HashMap<TextureId, (u32, u32)>,
    deleted: Vec<TextureId>,
    draws: Vec<RecordedDraw>,
}

impl HeadlessBackend {
    /// A backend with no textures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of textures currently held.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Size of a held texture.
    pub fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&id).copied()
    }

    /// Textures deleted so far, in order.
    pub fn deleted(&self) -> &[TextureId] {
        &self.deleted
    }

    /// Draw calls recorded since the last [`take_draws`](Self::take_draws).
    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    /// Drain the recorded draw calls.
    pub fn take_draws(&mut self) -> Vec<RecordedDraw> {
        std::mem::take(&mut self.draws)
    }
}

impl TextureBackend for HeadlessBackend {
    fn upload(&mut self, image: &DecodedImage) -> TextureId {
        self.next_id += 1;
        let id = TextureId(self.next_id);
        self.textures.insert(id, (image.width, image.height));
        id
    }

    fn delete(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_none() {
            tracing::warn!(?id, "delete of unknown texture");
        }
        self.deleted.push(id);
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn draw(&mut self, call: &DrawCall<'_>) {
        if !self.textures.contains_key(&call.texture) {
            tracing::warn!(texture = ?call.texture, "draw with unknown texture");
        }
        self.draws.push(RecordedDraw {
            texture: call.texture,
            quads: call.quads(),
            indices: call.indices.len(),
            scissor: call.scissor,
            first_color: call.vertices.first().map_or([0.0; 4], |v| v.color),
            first_index: call.indices.first().copied().unwrap_or(0),
        });
    }
}
