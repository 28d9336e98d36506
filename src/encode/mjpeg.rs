use std::time::Duration;

use crate::capture::chunk::CaptureSummary;
use crate::encode::encoder::{ChunkWriter, EncoderConfig, FrameCadence, FrameEncoder};
use crate::foundation::error::{EngineResult, SynthesisError};
use crate::foundation::math::flatten_premul_over_bg_to_rgb8;

/// In-process Motion-JPEG encoder: every frame becomes one baseline JPEG chunk.
pub(crate) struct MjpegEncoder {
    out: ChunkWriter,
    width: u32,
    height: u32,
    quality: u8,
    bg_rgba: [u8; 4],
    rgb: Vec<u8>,
    last_jpeg: Option<Vec<u8>>,
    last_pts: Duration,
    frame_step: Duration,
    cadence: FrameCadence,
}

impl MjpegEncoder {
    pub(crate) fn new(cfg: &EncoderConfig, out: ChunkWriter) -> EngineResult<Self> {
        cfg.validate()?;
        Ok(Self {
            out,
            width: cfg.frame.width,
            height: cfg.frame.height,
            quality: cfg.jpeg_quality,
            bg_rgba: cfg.bg_rgba,
            rgb: vec![0u8; cfg.frame.pixel_count() * 3],
            last_jpeg: None,
            last_pts: Duration::ZERO,
            frame_step: cfg.fps.frame_duration(),
            cadence: FrameCadence::new(cfg.fps),
        })
    }

    fn encode_rgb(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.rgb.len() / 8);
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode(&self.rgb, self.width, self.height, image::ExtendedColorType::Rgb8)
            .map_err(|e| SynthesisError::encoder(format!("jpeg encode failed: {e}")))?;
        Ok(buf)
    }
}

impl FrameEncoder for MjpegEncoder {
    fn push_frame(&mut self, frame_premul: &[u8], pts: Duration) -> EngineResult<()> {
        let Some(repeats) = self.cadence.place(pts) else {
            return Ok(());
        };
        if let Some(prev) = &self.last_jpeg {
            for i in 1..=repeats {
                let ts = self.last_pts + self.frame_step * u32::try_from(i).unwrap_or(u32::MAX);
                self.out.emit(prev.clone(), ts)?;
            }
        }
        flatten_premul_over_bg_to_rgb8(&mut self.rgb, frame_premul, self.bg_rgba)?;
        let jpeg = self.encode_rgb()?;
        if self.last_jpeg.is_none() {
            for _ in 0..repeats {
                self.out.emit(jpeg.clone(), pts)?;
            }
        }
        self.out.emit(jpeg.clone(), pts)?;
        self.last_jpeg = Some(jpeg);
        self.last_pts = pts;
        Ok(())
    }

    fn finish(self: Box<Self>) -> EngineResult<CaptureSummary> {
        Ok(self.cadence.summary())
    }

    fn abort(self: Box<Self>) {}
}

#[cfg(test)]
#[path = "../../tests/unit/encode/mjpeg.rs"]
mod tests;
