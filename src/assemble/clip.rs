use std::sync::Arc;
use std::time::Duration;

use crate::assemble::registry::{ClipHandle, ClipRegistry};
use crate::capture::chunk::EncodedChunk;
use crate::encode::encoder::ClipFormat;
use crate::foundation::core::Canvas;
use crate::foundation::error::{EngineResult, SynthesisError};

/// Stream facts the assembler stamps onto the finished clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipMeta {
    /// Container/codec of the chunks.
    pub format: ClipFormat,
    /// Frame dimensions.
    pub frame: Canvas,
    /// Frames in the encoded stream.
    pub frame_count: u64,
    /// Playback duration.
    pub duration: Duration,
}

/// Finalized clip plus its revocable reference.
#[derive(Clone, Debug)]
pub struct SynthesisResult {
    bytes: Arc<[u8]>,
    handle: ClipHandle,
    meta: ClipMeta,
    fingerprint: u64,
}

impl SynthesisResult {
    /// URL the clip resolves under until revoked.
    pub fn url(&self) -> &str {
        self.handle.url()
    }

    /// Revocable handle.
    pub fn handle(&self) -> &ClipHandle {
        &self.handle
    }

    /// Encoded clip bytes. Stay valid after the handle is revoked.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type of [`bytes`](Self::bytes).
    pub fn content_type(&self) -> &'static str {
        self.meta.format.content_type()
    }

    /// Container/codec.
    pub fn format(&self) -> ClipFormat {
        self.meta.format
    }

    /// Playback duration.
    pub fn duration(&self) -> Duration {
        self.meta.duration
    }

    /// Frames in the encoded stream.
    pub fn frame_count(&self) -> u64 {
        self.meta.frame_count
    }

    /// Frame dimensions.
    pub fn frame(&self) -> Canvas {
        self.meta.frame
    }

    /// xxh3 of the clip bytes.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// Turns a run's chunk sequence into one registered clip.
#[derive(Clone, Debug)]
pub struct EncodedClipAssembler {
    registry: ClipRegistry,
}

impl EncodedClipAssembler {
    /// Assembler registering clips in `registry`.
    pub fn new(registry: ClipRegistry) -> Self {
        Self { registry }
    }

    /// Concatenate `chunks` in order and register the result.
    ///
    /// Fails with `EmptyOutput` for zero chunks or zero total bytes; a gap or reordering in
    /// the sequence numbers is an encoder error.
    pub fn finalize(&self, chunks: Vec<EncodedChunk>, meta: ClipMeta) -> EngineResult<SynthesisResult> {
        if chunks.is_empty() {
            return Err(SynthesisError::EmptyOutput);
        }
        let mut total = 0usize;
        for (expected, chunk) in chunks.iter().enumerate() {
            if chunk.seq != expected as u64 {
                return Err(SynthesisError::encoder(format!(
                    "chunk sequence broken: expected {expected}, got {}",
                    chunk.seq
                )));
            }
            total += chunk.data.len();
        }
        if total == 0 {
            return Err(SynthesisError::EmptyOutput);
        }

        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks {
            bytes.extend_from_slice(&chunk.data);
        }
        let fingerprint = fingerprint_bytes(&bytes);
        let bytes: Arc<[u8]> = bytes.into();
        let handle = self.registry.register(
            bytes.clone(),
            meta.format.content_type(),
            meta.format.extension(),
            fingerprint,
        );
        tracing::debug!(url = handle.url(), bytes = total, "clip finalized");

        Ok(SynthesisResult {
            bytes,
            handle,
            meta,
            fingerprint,
        })
    }
}

fn fingerprint_bytes(bytes: &[u8]) -> u64 {
    let mut h = xxhash_rust::xxh3::Xxh3::with_seed(0x5354_494c_4c4d_4f54);
    h.update(bytes);
    h.digest()
}

#[cfg(test)]
#[path = "../../tests/unit/assemble/clip.rs"]
mod tests;
