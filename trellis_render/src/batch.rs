// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quad batching: consecutive quads that share a texture become one draw call.

use bytemuck::{Pod, Zeroable};
use kurbo::{Point, Rect, Size};
use trellis_resource::TextureId;

use crate::backend::GraphicsBackend;

/// One corner of a quad, in screen pixels.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Screen position.
    pub pos: [f32; 2],
    /// Texture coordinate.
    pub uv: [f32; 2],
    /// Premultiplied RGBA tint.
    pub color: [f32; 4],
}

/// Configuration for the [`QuadBatcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Quads per draw call before a flush is forced.
    pub max_quads_per_batch: usize,
}

impl BatchConfig {
    /// Default limits: 16 384 quads per call.
    pub const DEFAULT: Self = Self {
        max_quads_per_batch: 16_384,
    };
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A single draw submitted to the [`GraphicsBackend`].
#[derive(Clone, Copy, Debug)]
pub struct DrawCall<'a> {
    /// Four vertices per quad.
    pub vertices: &'a [Vertex],
    /// Six indices per quad (two triangles), relative to `vertices`.
    pub indices: &'a [u32],
    /// The one texture sampled by every quad.
    pub texture: TextureId,
    /// Column-major screen-to-clip matrix.
    pub projection: [f32; 16],
    /// Screen rectangle to restrict drawing to.
    pub scissor: Option<Rect>,
}

impl DrawCall<'_> {
    /// Number of quads in the call.
    pub fn quads(&self) -> usize {
        self.vertices.len() / 4
    }
}

/// Orthographic projection from screen pixels (origin top-left, y down) to
/// clip space.
pub fn ortho(viewport: Size) -> [f32; 16] {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Projection matrices are f32 on the GPU."
    )]
    let (w, h) = (viewport.width.max(1.0) as f32, viewport.height.max(1.0) as f32);
    [
        2.0 / w, 0.0, 0.0, 0.0, //
        0.0, -2.0 / h, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0,
    ]
}

/// Counts from one batching pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Draw calls submitted.
    pub draw_calls: usize,
    /// Quads submitted.
    pub quads: usize,
}

/// Accumulates quads in reused buffers and flushes them as draw calls.
///
/// A flush happens whenever the texture changes or the batch is full, so a
/// run of same-texture quads in paint order costs one call.
#[derive(Debug)]
pub struct QuadBatcher {
    config: BatchConfig,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    texture: Option<TextureId>,
    projection: [f32; 16],
    scissor: Option<Rect>,
    stats: BatchStats,
}

impl QuadBatcher {
    /// An empty batcher.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config: BatchConfig {
                max_quads_per_batch: config.max_quads_per_batch.max(1),
            },
            vertices: Vec::new(),
            indices: Vec::new(),
            texture: None,
            projection: ortho(Size::new(1.0, 1.0)),
            scissor: None,
            stats: BatchStats::default(),
        }
    }

    /// Start a pass with the given projection and scissor. Buffers are kept.
    pub fn begin(&mut self, projection: [f32; 16], scissor: Option<Rect>) {
        self.vertices.clear();
        self.indices.clear();
        self.texture = None;
        self.projection = projection;
        self.scissor = scissor;
        self.stats = BatchStats::default();
    }

    /// Add a quad with corners in drawing order (clockwise from the origin corner).
    pub fn push_quad<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        texture: TextureId,
        corners: [Point; 4],
        uv: Rect,
        color: [f32; 4],
    ) {
        let quads = self.vertices.len() / 4;
        if self.texture.is_some_and(|t| t != texture) || quads >= self.config.max_quads_per_batch {
            self.flush(backend);
        }
        self.texture = Some(texture);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Batches are bounded well below u32::MAX vertices."
        )]
        let base = self.vertices.len() as u32;
        let uvs = [
            (uv.x0, uv.y0),
            (uv.x1, uv.y0),
            (uv.x1, uv.y1),
            (uv.x0, uv.y1),
        ];
        let [r, g, b, a] = color;
        let premul = [r * a, g * a, b * a, a];
        for (p, (u, v)) in corners.into_iter().zip(uvs) {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Vertex data is f32 on the GPU."
            )]
            let (pos, uv) = ([p.x as f32, p.y as f32], [u as f32, v as f32]);
            self.vertices.push(Vertex {
                pos,
                uv,
                color: premul,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Submit whatever is batched.
    pub fn flush<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        let Some(texture) = self.texture else {
            return;
        };
        if self.vertices.is_empty() {
            return;
        }
        let call = DrawCall {
            vertices: &self.vertices,
            indices: &self.indices,
            texture,
            projection: self.projection,
            scissor: self.scissor,
        };
        backend.draw(&call);
        self.stats.draw_calls += 1;
        self.stats.quads += call.quads();
        self.vertices.clear();
        self.indices.clear();
    }

    /// Flush and return the counts for this pass.
    pub fn finish<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) -> BatchStats {
        self.flush(backend);
        self.texture = None;
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    const FULL: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);

    fn unit_quad(x: f64) -> [Point; 4] {
        [
            Point::new(x, 0.0),
            Point::new(x + 1.0, 0.0),
            Point::new(x + 1.0, 1.0),
            Point::new(x, 1.0),
        ]
    }

    fn run(textures: &[u64], config: BatchConfig) -> (BatchStats, HeadlessBackend) {
        let mut gpu = HeadlessBackend::new();
        let mut batcher = QuadBatcher::new(config);
        batcher.begin(ortho(Size::new(100.0, 100.0)), None);
        for (i, &t) in textures.iter().enumerate() {
            let x = f64::from(u32::try_from(i).unwrap());
            batcher.push_quad(&mut gpu, TextureId(t), unit_quad(x), FULL, [1.0; 4]);
        }
        (batcher.finish(&mut gpu), gpu)
    }

    #[test]
    fn same_texture_is_one_call() {
        let (stats, gpu) = run(&[7; 50], BatchConfig::DEFAULT);
        assert_eq!(stats, BatchStats { draw_calls: 1, quads: 50 });
        assert_eq!(gpu.draws()[0].indices, 300);
    }

    #[test]
    fn alternating_textures_flush_every_quad() {
        let (stats, _) = run(&[1, 2, 1, 2, 1, 2], BatchConfig::DEFAULT);
        assert_eq!(stats.draw_calls, 6);
    }

    #[test]
    fn full_batches_are_split() {
        let (stats, gpu) = run(&[3; 10], BatchConfig { max_quads_per_batch: 4 });
        assert_eq!(stats.draw_calls, 3);
        let sizes: Vec<usize> = gpu.draws().iter().map(|d| d.quads).collect();
        assert_eq!(sizes, [4, 4, 2]);
    }

    #[test]
    fn colors_are_premultiplied_and_indices_are_relative() {
        let mut gpu = HeadlessBackend::new();
        let mut batcher = QuadBatcher::new(BatchConfig::DEFAULT);
        batcher.begin(ortho(Size::new(10.0, 10.0)), None);
        batcher.push_quad(&mut gpu, TextureId(1), unit_quad(0.0), FULL, [1.0, 0.5, 0.0, 0.5]);
        batcher.push_quad(&mut gpu, TextureId(2), unit_quad(1.0), FULL, [1.0; 4]);
        batcher.finish(&mut gpu);
        let first = &gpu.draws()[0];
        assert_eq!(first.first_color, [0.5, 0.25, 0.0, 0.5]);
        assert_eq!(gpu.draws()[1].first_index, 0);
    }
}
