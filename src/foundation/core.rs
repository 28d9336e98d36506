use std::time::Duration;

use crate::foundation::error::{EngineResult, SynthesisError};

pub use kurbo::{Affine, Point, Rect, Vec2};

const MICROS_PER_SEC: u64 = 1_000_000;

/// Pixel dimensions of an image or output frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Build a canvas, rejecting zero-sized dimensions.
    pub fn new(width: u32, height: u32) -> EngineResult<Self> {
        if width == 0 || height == 0 {
            return Err(SynthesisError::invalid_input(format!(
                "canvas dimensions must be non-zero (got {width}x{height})"
            )));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels.
    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Byte length of an RGBA8 buffer covering the canvas.
    pub fn rgba8_len(self) -> usize {
        self.pixel_count().saturating_mul(4)
    }

    /// Width divided by height.
    pub fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    pub(crate) fn to_u16(self) -> EngineResult<(u16, u16)> {
        let w: u16 = self.width.try_into().map_err(|_| {
            SynthesisError::invalid_input(format!("width {} exceeds {}", self.width, u16::MAX))
        })?;
        let h: u16 = self.height.try_into().map_err(|_| {
            SynthesisError::invalid_input(format!("height {} exceeds {}", self.height, u16::MAX))
        })?;
        Ok((w, h))
    }
}

/// Rational frame rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be > 0.
    pub den: u32,
}

impl Fps {
    /// Build a frame rate, rejecting zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> EngineResult<Self> {
        if den == 0 {
            return Err(SynthesisError::invalid_input("fps den must be > 0"));
        }
        if num == 0 {
            return Err(SynthesisError::invalid_input("fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Presentation time of frame `index`, in whole microseconds.
    ///
    /// Integer arithmetic keeps tick schedules exact: frame 90 at 30 fps lands on 3s, not
    /// on 2.9999s.
    pub fn frame_time(self, index: u64) -> Duration {
        let micros = u128::from(index) * u128::from(MICROS_PER_SEC) * u128::from(self.den)
            / u128::from(self.num);
        Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
    }

    /// Duration of one frame.
    pub fn frame_duration(self) -> Duration {
        self.frame_time(1)
    }

    /// Index of the frame closest to `pts`.
    pub fn frame_index_at(self, pts: Duration) -> u64 {
        let scaled = pts.as_micros() * u128::from(self.num);
        let denom = u128::from(MICROS_PER_SEC) * u128::from(self.den);
        ((scaled + denom / 2) / denom).min(u128::from(u64::MAX)) as u64
    }

    /// Playback duration of a constant-rate stream holding `frames` frames.
    pub fn stream_duration(self, frames: u64) -> Duration {
        self.frame_time(frames)
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
