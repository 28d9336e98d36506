use crate::foundation::core::{Affine, Canvas, Rect, Vec2};
use crate::foundation::error::EngineResult;
use crate::foundation::math::lerp;
use crate::motion::style::{MotionKey, MotionPreset, MotionStyle};

/// Camera transform for one frame.
///
/// `scale` is zoom relative to a cover-fit of the source in the output frame. The offsets are
/// in source pixels, measured from the image center to the center of the visible window.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    /// Zoom factor (>= 1).
    pub scale: f64,
    /// Horizontal window offset in source pixels.
    pub offset_x: f64,
    /// Vertical window offset in source pixels.
    pub offset_y: f64,
}

impl Viewport {
    /// Centered cover-fit, no zoom.
    pub const IDENTITY: Viewport = Viewport {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Rectangle of the source (in source pixels) that this viewport shows in `frame`.
    pub fn source_window(&self, source: Canvas, frame: Canvas) -> Rect {
        let (win_w, win_h) = window_size(source, frame, self.scale);
        let cx = f64::from(source.width) / 2.0 + self.offset_x;
        let cy = f64::from(source.height) / 2.0 + self.offset_y;
        Rect::new(
            cx - win_w / 2.0,
            cy - win_h / 2.0,
            cx + win_w / 2.0,
            cy + win_h / 2.0,
        )
    }

    /// Transform mapping source pixel coordinates to output frame coordinates.
    pub fn to_affine(&self, source: Canvas, frame: Canvas) -> Affine {
        let k = cover_scale(source, frame) * self.scale.max(1.0);
        let window_center = Vec2::new(
            f64::from(source.width) / 2.0 + self.offset_x,
            f64::from(source.height) / 2.0 + self.offset_y,
        );
        let frame_center = Vec2::new(
            f64::from(frame.width) / 2.0,
            f64::from(frame.height) / 2.0,
        );
        Affine::translate(frame_center) * Affine::scale(k) * Affine::translate(-window_center)
    }
}

/// Deterministic camera path: a pure function of normalized time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionPath {
    source: Canvas,
    frame: Canvas,
    style: MotionStyle,
    preset: MotionPreset,
}

impl MotionPath {
    /// Viewport at normalized time `t`. Out-of-range inputs are clamped, NaN reads as 0.
    pub fn viewport_at(&self, t: f64) -> Viewport {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let e = self.preset.ease.apply(t);
        let key = MotionKey {
            scale: lerp(self.preset.start.scale, self.preset.end.scale, e),
            x: lerp(self.preset.start.x, self.preset.end.x, e),
            y: lerp(self.preset.start.y, self.preset.end.y, e),
        };

        let scale = if key.scale.is_finite() {
            key.scale.max(1.0)
        } else {
            1.0
        };
        let (win_w, win_h) = window_size(self.source, self.frame, scale);
        let slack_x = ((f64::from(self.source.width) - win_w) / 2.0).max(0.0);
        let slack_y = ((f64::from(self.source.height) - win_h) / 2.0).max(0.0);

        Viewport {
            scale,
            offset_x: clamp_unit(key.x) * slack_x,
            offset_y: clamp_unit(key.y) * slack_y,
        }
    }

    /// Source image dimensions the path was planned for.
    pub fn source(&self) -> Canvas {
        self.source
    }

    /// Output frame dimensions the path was planned for.
    pub fn frame(&self) -> Canvas {
        self.frame
    }

    /// Style the path was planned from.
    pub fn style(&self) -> MotionStyle {
        self.style
    }
}

/// Plans camera paths for a fixed output frame.
///
/// Purely geometric: never looks at pixel content.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotionPlanner {
    frame: Option<Canvas>,
}

impl MotionPlanner {
    /// Planner whose output frame matches the source's own dimensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Planner for a fixed output frame size.
    pub fn with_frame(frame: Canvas) -> Self {
        Self { frame: Some(frame) }
    }

    /// Plan the camera path for a `width`x`height` source image.
    pub fn plan(&self, width: u32, height: u32, style: MotionStyle) -> EngineResult<MotionPath> {
        let source = Canvas::new(width, height)?;
        let frame = match self.frame {
            Some(f) => Canvas::new(f.width, f.height)?,
            None => source,
        };
        Ok(MotionPath {
            source,
            frame,
            style,
            preset: style.preset(),
        })
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) }
}

/// Uniform scale that makes the source cover the whole frame.
fn cover_scale(source: Canvas, frame: Canvas) -> f64 {
    let sx = f64::from(frame.width) / f64::from(source.width);
    let sy = f64::from(frame.height) / f64::from(source.height);
    sx.max(sy)
}

/// Size of the visible source window at `scale`, never larger than the source itself.
fn window_size(source: Canvas, frame: Canvas, scale: f64) -> (f64, f64) {
    let k = cover_scale(source, frame) * scale.max(1.0);
    let win_w = (f64::from(frame.width) / k).min(f64::from(source.width));
    let win_h = (f64::from(frame.height) / k).min(f64::from(source.height));
    (win_w, win_h)
}

#[cfg(test)]
#[path = "../../tests/unit/motion/planner.rs"]
mod tests;
