use std::path::PathBuf;
use std::time::Duration;

use crate::assets::decode::SourceImage;
use crate::capture::session::CaptureOpts;
use crate::encode::encoder::ClipFormat;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{EngineResult, SynthesisError};
use crate::motion::style::MotionStyle;

/// Default clip length.
pub const DEFAULT_DURATION_MS: u64 = 3000;
/// Longest clip a run may request.
pub const MAX_DURATION_MS: u64 = 60_000;

/// Per-run options. Every field is optional; `None` means "use the default".
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisConfig {
    /// Motion style, `zoom_in` when absent.
    pub style: Option<MotionStyle>,
    /// Clip length in milliseconds (1..=60000), 3000 when absent.
    pub duration_ms: Option<u64>,
    /// Output width; follows the source (or `height` and the source aspect) when absent.
    pub width: Option<u32>,
    /// Output height; follows the source (or `width` and the source aspect) when absent.
    pub height: Option<u32>,
}

/// [`SynthesisConfig`] with every default filled in for a particular source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Motion style.
    pub style: MotionStyle,
    /// Clip length.
    pub duration: Duration,
    /// Output frame size.
    pub frame: Canvas,
}

impl SynthesisConfig {
    /// Parse from JSON. Unknown fields are rejected.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SynthesisError::invalid_input(format!("synthesis config: {e}")))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string(self)
            .map_err(|e| SynthesisError::invalid_input(format!("synthesis config: {e}")))
    }

    /// Set the motion style.
    pub fn with_style(mut self, style: MotionStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Set the clip length.
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Set both output dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Fill in defaults against `source` for output in `format`.
    pub fn resolve(&self, source: &SourceImage, format: ClipFormat) -> EngineResult<ResolvedConfig> {
        let duration_ms = self.duration_ms.unwrap_or(DEFAULT_DURATION_MS);
        if !(1..=MAX_DURATION_MS).contains(&duration_ms) {
            return Err(SynthesisError::invalid_input(format!(
                "duration_ms must be in 1..={MAX_DURATION_MS} (got {duration_ms})"
            )));
        }

        let src = source.canvas();
        let (w, h) = match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, follow_aspect(w, src.height, src.width)),
            (None, Some(h)) => (follow_aspect(h, src.width, src.height), h),
            (None, None) => (src.width, src.height),
        };
        let (w, h) = if format.needs_even_dims() {
            (round_down_even(w), round_down_even(h))
        } else {
            (w, h)
        };
        let frame = Canvas::new(w, h)?;

        Ok(ResolvedConfig {
            style: self.style.unwrap_or_default(),
            duration: Duration::from_millis(duration_ms),
            frame,
        })
    }
}

// Scale `given` by `num/den`, rounding to nearest and never below 1.
fn follow_aspect(given: u32, num: u32, den: u32) -> u32 {
    let v = (u64::from(given) * u64::from(num) + u64::from(den) / 2) / u64::from(den);
    u32::try_from(v).unwrap_or(u32::MAX).max(1)
}

fn round_down_even(v: u32) -> u32 {
    if v <= 2 { 2 } else { v & !1 }
}

/// Engine-wide options, fixed for the lifetime of a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOpts {
    /// Render/encode frame rate.
    pub fps: Fps,
    /// Output container/codec.
    pub format: ClipFormat,
    /// How long to wait for the encoder's final data after capture stops.
    pub finalize_grace: Duration,
    /// Colour behind transparent pixels and letterboxing.
    pub bg_rgba: [u8; 4],
    /// Motion-JPEG quality (1..=100).
    pub jpeg_quality: u8,
    /// ffmpeg binary used by the default encoder provider.
    pub ffmpeg: PathBuf,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            format: ClipFormat::default(),
            finalize_grace: Duration::from_millis(2000),
            bg_rgba: [0, 0, 0, 255],
            jpeg_quality: 85,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl EngineOpts {
    /// Defaults overridden by `STILLMOTION_FPS` (`30` or `30000/1001`), `STILLMOTION_FORMAT`,
    /// `STILLMOTION_FINALIZE_GRACE_MS` and `STILLMOTION_FFMPEG`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        if let Some(fps) = std::env::var("STILLMOTION_FPS")
            .ok()
            .and_then(|v| parse_fps(&v))
        {
            opts.fps = fps;
        }
        if let Some(format) = std::env::var("STILLMOTION_FORMAT")
            .ok()
            .and_then(|v| v.parse::<ClipFormat>().ok())
        {
            opts.format = format;
        }
        if let Some(ms) = std::env::var("STILLMOTION_FINALIZE_GRACE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&n| n > 0)
        {
            opts.finalize_grace = Duration::from_millis(ms);
        }
        if let Some(path) = std::env::var_os("STILLMOTION_FFMPEG").filter(|p| !p.is_empty()) {
            opts.ffmpeg = PathBuf::from(path);
        }
        opts
    }

    /// Set the frame rate.
    pub fn with_fps(mut self, fps: Fps) -> Self {
        self.fps = fps;
        self
    }

    /// Set the clip format.
    pub fn with_format(mut self, format: ClipFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the finalize grace period.
    pub fn with_finalize_grace(mut self, grace: Duration) -> Self {
        self.finalize_grace = grace;
        self
    }

    /// Set the background colour.
    pub fn with_bg_rgba(mut self, bg_rgba: [u8; 4]) -> Self {
        self.bg_rgba = bg_rgba;
        self
    }

    /// Set the Motion-JPEG quality.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Set the ffmpeg binary.
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// Reject option combinations no run could succeed with.
    pub fn validate(&self) -> EngineResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.finalize_grace.is_zero() {
            return Err(SynthesisError::invalid_input("finalize grace must be > 0"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SynthesisError::invalid_input("jpeg quality must be in 1..=100"));
        }
        Ok(())
    }

    pub(crate) fn capture_opts(&self) -> CaptureOpts {
        CaptureOpts {
            fps: self.fps,
            format: self.format,
            bg_rgba: self.bg_rgba,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

fn parse_fps(v: &str) -> Option<Fps> {
    let v = v.trim();
    let (num, den) = match v.split_once('/') {
        Some((n, d)) => (n.trim().parse().ok()?, d.trim().parse().ok()?),
        None => (v.parse().ok()?, 1),
    };
    Fps::new(num, den).ok()
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
