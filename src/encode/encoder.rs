use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::mpsc;
use std::time::Duration;

use crate::capture::chunk::CaptureSummary;
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{EngineResult, SynthesisError};

/// Container/codec of the produced clip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipFormat {
    /// VP9 in WebM, streamed out of the system `ffmpeg`.
    #[default]
    Webm,
    /// H.264 in fragmented MP4, streamed out of the system `ffmpeg`.
    Mp4,
    /// Motion-JPEG (concatenated JPEG frames), encoded in-process.
    Mjpeg,
}

impl ClipFormat {
    /// Every format, in preference order.
    pub const ALL: [ClipFormat; 3] = [Self::Webm, Self::Mp4, Self::Mjpeg];

    /// MIME type of the finalized clip.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Webm => "video/webm",
            Self::Mp4 => "video/mp4",
            Self::Mjpeg => "video/x-motion-jpeg",
        }
    }

    /// File extension used in clip URLs.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
            Self::Mjpeg => "mjpeg",
        }
    }

    /// Whether the codec subsamples chroma (yuv420) and therefore needs even dimensions.
    pub fn needs_even_dims(self) -> bool {
        matches!(self, Self::Webm | Self::Mp4)
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        self.extension()
    }
}

impl std::fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ClipFormat {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webm" | "vp9" => Ok(Self::Webm),
            "mp4" | "h264" => Ok(Self::Mp4),
            "mjpeg" | "mjpg" | "jpeg" => Ok(Self::Mjpeg),
            other => Err(SynthesisError::invalid_input(format!(
                "unknown clip format '{other}'"
            ))),
        }
    }
}

/// Parameters an encoder session is opened with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Frame size. Frames pushed to the encoder are exactly this size.
    pub frame: Canvas,
    /// Constant output frame rate.
    pub fps: Fps,
    /// Opaque colour transparent pixels are flattened onto.
    pub bg_rgba: [u8; 4],
    /// Requested container/codec.
    pub format: ClipFormat,
    /// JPEG quality (1..=100) for Motion-JPEG output.
    pub jpeg_quality: u8,
}

impl EncoderConfig {
    pub(crate) fn validate(&self) -> EngineResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.format.needs_even_dims()
            && (!self.frame.width.is_multiple_of(2) || !self.frame.height.is_multiple_of(2))
        {
            return Err(SynthesisError::invalid_input(format!(
                "{} output needs even dimensions (got {}x{})",
                self.format, self.frame.width, self.frame.height
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SynthesisError::invalid_input("jpeg quality must be in 1..=100"));
        }
        Ok(())
    }
}

/// Messages from the capture worker (and encoder threads) back to the session owner.
#[derive(Debug)]
pub(crate) enum CaptureEvent {
    Chunk { data: Vec<u8>, timestamp: Duration },
    Finished(CaptureSummary),
    Failed(SynthesisError),
}

/// Output side handed to an encoder: every call delivers one chunk to the capture session.
#[derive(Clone, Debug)]
pub struct ChunkWriter {
    tx: mpsc::Sender<CaptureEvent>,
}

impl ChunkWriter {
    pub(crate) fn new(tx: mpsc::Sender<CaptureEvent>) -> Self {
        Self { tx }
    }

    /// Deliver encoded bytes. Empty payloads are dropped.
    pub fn emit(&self, data: Vec<u8>, timestamp: Duration) -> EngineResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.tx
            .send(CaptureEvent::Chunk { data, timestamp })
            .map_err(|_| SynthesisError::encoder("capture session is gone"))
    }
}

/// One open encoder session.
///
/// `push_frame` receives premultiplied RGBA8 frames in presentation order; `pts` is relative to
/// the first frame. Exactly one of `finish` or `abort` ends the session.
///
/// Blocking calls must return soon after the session's abort token is raised. A session that
/// does not is detached from its capture worker after a bounded wait and left to finish on its
/// own.
pub trait FrameEncoder: Send {
    /// Encode a frame presented at `pts`.
    fn push_frame(&mut self, frame_premul: &[u8], pts: Duration) -> EngineResult<()>;
    /// Flush all remaining output through the [`ChunkWriter`] and close the stream.
    fn finish(self: Box<Self>) -> EngineResult<CaptureSummary>;
    /// Tear down without producing final output.
    fn abort(self: Box<Self>);
}

/// Source of encoder sessions.
pub trait EncoderProvider: Send + Sync {
    /// Whether a session for `format` can be opened on this machine.
    fn supports(&self, format: ClipFormat) -> bool;
    /// Open a session. `abort` is raised when the session must stop immediately.
    fn open(
        &self,
        cfg: &EncoderConfig,
        out: ChunkWriter,
        abort: CancelToken,
    ) -> EngineResult<Box<dyn FrameEncoder>>;
}

/// Default provider: the system `ffmpeg` for WebM and MP4, in-process Motion-JPEG.
#[derive(Debug)]
pub struct SystemEncoders {
    ffmpeg: PathBuf,
    caps: OnceLock<HashSet<ClipFormat>>,
}

impl Default for SystemEncoders {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl SystemEncoders {
    /// Provider using the `ffmpeg` binary at `ffmpeg` (a bare name is looked up on `PATH`).
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            caps: OnceLock::new(),
        }
    }

    /// Path of the ffmpeg binary.
    pub fn ffmpeg(&self) -> &std::path::Path {
        &self.ffmpeg
    }

    fn caps(&self) -> &HashSet<ClipFormat> {
        self.caps.get_or_init(|| {
            let mut caps = HashSet::from([ClipFormat::Mjpeg]);
            let listed = crate::encode::ffmpeg::probe_encoders(&self.ffmpeg);
            for format in [ClipFormat::Webm, ClipFormat::Mp4] {
                if let Some(codec) = crate::encode::ffmpeg::codec_for(format)
                    && listed.iter().any(|c| c == codec)
                {
                    caps.insert(format);
                }
            }
            tracing::debug!(ffmpeg = %self.ffmpeg.display(), ?caps, "probed encoders");
            caps
        })
    }
}

impl EncoderProvider for SystemEncoders {
    fn supports(&self, format: ClipFormat) -> bool {
        self.caps().contains(&format)
    }

    fn open(
        &self,
        cfg: &EncoderConfig,
        out: ChunkWriter,
        abort: CancelToken,
    ) -> EngineResult<Box<dyn FrameEncoder>> {
        if !self.supports(cfg.format) {
            return Err(SynthesisError::unsupported_format(format!(
                "no {} encoder available",
                cfg.format
            )));
        }
        cfg.validate()?;
        match cfg.format {
            ClipFormat::Mjpeg => Ok(Box::new(crate::encode::mjpeg::MjpegEncoder::new(
                cfg, out,
            )?)),
            ClipFormat::Webm | ClipFormat::Mp4 => Ok(Box::new(
                crate::encode::ffmpeg::FfmpegEncoder::spawn(&self.ffmpeg, cfg, out, abort)?,
            )),
        }
    }
}

/// Maps presentation times onto constant-rate frame slots.
///
/// A frame whose slot was already written is stale; a frame that lands past the next free slot
/// leaves a gap that the encoder fills by repeating the previous frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FrameCadence {
    fps: Fps,
    next: u64,
}

impl FrameCadence {
    pub(crate) fn new(fps: Fps) -> Self {
        Self { fps, next: 0 }
    }

    /// Number of repeats of the previous frame to write before this one, or `None` if stale.
    pub(crate) fn place(&mut self, pts: Duration) -> Option<u64> {
        let index = self.fps.frame_index_at(pts);
        if index < self.next {
            return None;
        }
        let repeats = index - self.next;
        self.next = index + 1;
        Some(repeats)
    }

    pub(crate) fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            frames: self.next,
            duration: self.fps.stream_duration(self.next),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
