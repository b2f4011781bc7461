// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Texture sources and decoding to premultiplied RGBA8.

use std::path::Path;
use std::sync::Arc;

use crate::error::LoadError;

/// CPU-side pixels ready for upload: tightly packed, premultiplied RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, alpha premultiplied.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl DecodedImage {
    /// An image filled with one premultiplied color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            rgba8_premul: Arc::new(data),
        }
    }

    /// The 1×1 opaque white image used for solid fills and failed loads.
    pub fn placeholder() -> Self {
        Self::solid(1, 1, [255, 255, 255, 255])
    }
}

impl core::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba8_premul.len())
            .finish()
    }
}

/// Where a texture's pixels come from.
#[derive(Clone, Debug)]
pub enum SourceDescriptor {
    /// A file path or `file://` URL to read and decode.
    Url(String),
    /// Pixels that are already decoded, e.g. a rasterized glyph atlas page.
    Raster(DecodedImage),
}

impl From<&str> for SourceDescriptor {
    fn from(url: &str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl From<DecodedImage> for SourceDescriptor {
    fn from(image: DecodedImage) -> Self {
        Self::Raster(image)
    }
}

/// Turns a [`SourceDescriptor`] into pixels. Runs on executor threads.
pub trait Decoder: Send + Sync {
    /// Produce the image for `source`.
    fn decode(&self, source: &SourceDescriptor) -> Result<DecodedImage, LoadError>;
}

/// Reads local files and decodes PNG or JPEG with the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileDecoder;

impl Decoder for FileDecoder {
    fn decode(&self, source: &SourceDescriptor) -> Result<DecodedImage, LoadError> {
        match source {
            SourceDescriptor::Raster(img) => Ok(img.clone()),
            SourceDescriptor::Url(url) => {
                let path = match url.split_once("://") {
                    None => url.as_str(),
                    Some(("file", rest)) => rest,
                    Some((scheme, _)) => {
                        return Err(LoadError::unsupported(format!("scheme `{scheme}`")));
                    }
                };
                let bytes = std::fs::read(Path::new(path)).map_err(|source| LoadError::Io {
                    path: url.clone(),
                    source,
                })?;
                decode_image(&bytes)
            }
        }
    }
}

/// Decode encoded image bytes and convert to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, LoadError> {
    let dyn_img = image::load_from_memory(bytes).map_err(|e| LoadError::decode(e.to_string()))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "channel * alpha / 255 always fits in a byte"
)]
fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("png encode");
        out.into_inner()
    }

    #[test]
    fn premultiplies_alpha() {
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 128, 0, 128]));
        img.put_pixel(1, 0, image::Rgba([10, 20, 30, 0]));
        let decoded = decode_image(&encode_png(&img)).unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 1));
        assert_eq!(&decoded.rgba8_premul[..4], &[128, 64, 0, 128]);
        assert_eq!(&decoded.rgba8_premul[4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let err = decode_image(b"not an image").unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn remote_urls_are_unsupported() {
        let err = FileDecoder
            .decode(&SourceDescriptor::from("https://example.com/a.png"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Unsupported(_)), "got {err:?}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FileDecoder
            .decode(&SourceDescriptor::from("file:///definitely/not/here.png"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }), "got {err:?}");
    }

    #[test]
    fn raster_passes_through() {
        let img = DecodedImage::solid(3, 2, [1, 2, 3, 255]);
        let out = FileDecoder
            .decode(&SourceDescriptor::Raster(img.clone()))
            .unwrap();
        assert_eq!(out, img);
        assert_eq!(out.rgba8_premul.len(), 24);
    }
}
