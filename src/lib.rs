//! stillmotion turns a single still image into a short playable clip on the local machine.
//!
//! A run is driven by a [`SynthesisController`]:
//!
//! - [`MotionPlanner`] computes a deterministic camera path for the requested [`MotionStyle`]
//! - [`FrameRenderer`] paints the image through that path into a [`RenderSurface`] in real time
//! - [`StreamCaptureSession`] feeds presented frames to an encoder on a background thread
//! - [`EncodedClipAssembler`] joins the encoded chunks into a [`SynthesisResult`] with a
//!   revocable URL in a [`ClipRegistry`]
//!
//! Every surface and capture session a run creates is released before it returns, including
//! on cancellation and error; [`ResourceLedger`] makes that observable.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod animation;
mod assemble;
mod assets;
mod capture;
mod encode;
mod foundation;
mod motion;
mod render;
mod session;

pub use crate::animation::ease::Ease;
pub use crate::assemble::clip::{ClipMeta, EncodedClipAssembler, SynthesisResult};
pub use crate::assemble::registry::{ClipHandle, ClipRegistry};
pub use crate::assets::decode::{ImageInput, SourceImage};
pub use crate::capture::chunk::{CaptureSummary, EncodedChunk};
pub use crate::capture::session::{
    CaptureOpts, CapturedStream, FinalizingCapture, StreamCaptureSession,
};
pub use crate::encode::encoder::{
    ChunkWriter, ClipFormat, EncoderConfig, EncoderProvider, FrameEncoder, SystemEncoders,
};
pub use crate::encode::ffmpeg::is_ffmpeg_on_path;
pub use crate::foundation::cancel::CancelToken;
pub use crate::foundation::core::{Affine, Canvas, Fps, Point, Rect, Vec2};
pub use crate::foundation::error::{EngineResult, ErrorKind, SynthesisError};
pub use crate::motion::planner::{MotionPath, MotionPlanner, Viewport};
pub use crate::motion::style::{MotionKey, MotionPreset, MotionStyle};
pub use crate::render::renderer::FrameRenderer;
pub use crate::render::surface::RenderSurface;
pub use crate::session::config::{
    DEFAULT_DURATION_MS, EngineOpts, MAX_DURATION_MS, ResolvedConfig, SynthesisConfig,
};
pub use crate::session::controller::{SynthesisController, SynthesisState};
pub use crate::session::ledger::{ResourceLedger, ResourceStats};
