use std::sync::Arc;

use anyhow::Context;

use crate::foundation::core::Canvas;
use crate::foundation::error::{EngineResult, SynthesisError};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Immutable decoded still image.
///
/// Pixels are premultiplied RGBA8, row-major, tightly packed, behind an `Arc` so clones are
/// cheap and the raster is never mutated after decode.
///
/// Any size is accepted; the renderer downscales sources with an edge above 65535 px. Output
/// frames are capped at 65535 px per edge, so such sources need an explicit output size.
#[derive(Clone, Debug)]
pub struct SourceImage {
    canvas: Canvas,
    rgba8_premul: Arc<Vec<u8>>,
}

impl SourceImage {
    /// Decode encoded image bytes (any format the `image` crate was built with).
    pub fn decode(bytes: &[u8]) -> EngineResult<Self> {
        if bytes.is_empty() {
            return Err(SynthesisError::invalid_input("image bytes are empty"));
        }
        let dyn_img = image::load_from_memory(bytes)
            .context("decode image from memory")
            .map_err(|e| SynthesisError::invalid_input(format!("{e:#}")))?;
        Self::from_image(&dyn_img)
    }

    /// Convert an already decoded `image` buffer.
    pub fn from_image(img: &image::DynamicImage) -> EngineResult<Self> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Wrap straight-alpha RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, mut rgba8: Vec<u8>) -> EngineResult<Self> {
        let canvas = Canvas::new(width, height)?;
        if rgba8.len() != canvas.rgba8_len() {
            return Err(SynthesisError::invalid_input(format!(
                "rgba8 buffer is {} bytes, expected {} for {width}x{height}",
                rgba8.len(),
                canvas.rgba8_len()
            )));
        }
        premultiply_rgba8_in_place(&mut rgba8);
        Ok(Self {
            canvas,
            rgba8_premul: Arc::new(rgba8),
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.canvas.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.canvas.height
    }

    /// Dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Premultiplied RGBA8 pixels.
    pub fn rgba8_premul(&self) -> &[u8] {
        &self.rgba8_premul
    }
}

/// Image handed over by the caller: a decoded raster, encoded bytes, or nothing at all.
#[derive(Clone, Debug)]
pub enum ImageInput {
    /// Already decoded raster.
    Raster(SourceImage),
    /// Encoded image file contents.
    Encoded(Vec<u8>),
    /// No image was supplied.
    Absent,
}

impl ImageInput {
    /// Resolve into a decoded image, failing with `InvalidInput` when absent or undecodable.
    pub fn into_source(self) -> EngineResult<SourceImage> {
        match self {
            Self::Raster(img) => Ok(img),
            Self::Encoded(bytes) => SourceImage::decode(&bytes),
            Self::Absent => Err(SynthesisError::invalid_input("no image supplied")),
        }
    }
}

impl From<SourceImage> for ImageInput {
    fn from(img: SourceImage) -> Self {
        Self::Raster(img)
    }
}

impl From<&SourceImage> for ImageInput {
    fn from(img: &SourceImage) -> Self {
        Self::Raster(img.clone())
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Encoded(bytes)
    }
}

impl<T: Into<ImageInput>> From<Option<T>> for ImageInput {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Absent, Into::into)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
