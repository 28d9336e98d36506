use std::str::FromStr;

use crate::animation::ease::Ease;
use crate::foundation::error::SynthesisError;

/// Closed set of procedural camera motions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionStyle {
    /// Slow push towards the center.
    #[default]
    ZoomIn,
    /// Slow pull back from a tight center crop.
    ZoomOut,
    /// Camera travels right to left across the image.
    PanLeft,
    /// Camera travels left to right across the image.
    PanRight,
    /// Diagonal drift combined with a zoom-in.
    KenBurns,
}

/// One end of a motion: zoom and normalized window offset.
///
/// `scale` is relative to a cover-fit of the source in the output frame and is treated as at
/// least 1. `x`/`y` are fractions of the available slack in `[-1, 1]`; `-1` pins the window to
/// the left/top edge, `1` to the right/bottom edge.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MotionKey {
    /// Zoom factor (>= 1).
    pub scale: f64,
    /// Horizontal window position in slack units.
    pub x: f64,
    /// Vertical window position in slack units.
    pub y: f64,
}

impl MotionKey {
    /// Build a key.
    pub const fn new(scale: f64, x: f64, y: f64) -> Self {
        Self { scale, x, y }
    }
}

/// Hand-tuned parametric curve behind a [`MotionStyle`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MotionPreset {
    /// Pose at `t = 0`.
    pub start: MotionKey,
    /// Pose at `t = 1`.
    pub end: MotionKey,
    /// Curve applied to normalized time.
    pub ease: Ease,
}

impl MotionStyle {
    /// Every style, in declaration order.
    pub const ALL: [MotionStyle; 5] = [
        MotionStyle::ZoomIn,
        MotionStyle::ZoomOut,
        MotionStyle::PanLeft,
        MotionStyle::PanRight,
        MotionStyle::KenBurns,
    ];

    /// Stable identifier (matches the serde name).
    pub fn name(self) -> &'static str {
        match self {
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
            Self::PanLeft => "pan_left",
            Self::PanRight => "pan_right",
            Self::KenBurns => "ken_burns",
        }
    }

    /// Numeric tuning for this style. Aesthetic, not normative.
    pub fn preset(self) -> MotionPreset {
        let ease = Ease::InOutCubic;
        match self {
            Self::ZoomIn => MotionPreset {
                start: MotionKey::new(1.0, 0.0, 0.0),
                end: MotionKey::new(1.18, 0.0, 0.0),
                ease,
            },
            Self::ZoomOut => MotionPreset {
                start: MotionKey::new(1.18, 0.0, 0.0),
                end: MotionKey::new(1.0, 0.0, 0.0),
                ease,
            },
            Self::PanLeft => MotionPreset {
                start: MotionKey::new(1.15, 1.0, 0.0),
                end: MotionKey::new(1.15, -1.0, 0.0),
                ease,
            },
            Self::PanRight => MotionPreset {
                start: MotionKey::new(1.15, -1.0, 0.0),
                end: MotionKey::new(1.15, 1.0, 0.0),
                ease,
            },
            Self::KenBurns => MotionPreset {
                start: MotionKey::new(1.05, -0.6, 0.4),
                end: MotionKey::new(1.25, 0.5, -0.3),
                ease: Ease::InOutSine,
            },
        }
    }
}

impl std::fmt::Display for MotionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MotionStyle {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|style| style.name() == norm)
            .ok_or_else(|| SynthesisError::invalid_input(format!("unknown motion style '{s}'")))
    }
}
