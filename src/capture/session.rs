use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::capture::chunk::{CaptureSummary, EncodedChunk};
use crate::encode::encoder::{
    CaptureEvent, ChunkWriter, ClipFormat, EncoderConfig, EncoderProvider, FrameEncoder,
};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::Fps;
use crate::foundation::error::{EngineResult, SynthesisError};
use crate::render::surface::{CaptureBinding, FrameSlot, RenderSurface, SlotEvent};
use crate::session::ledger::{ResourceLedger, ResourceLease};

// How often a waiting finalizer re-checks its cancellation token.
const FINALIZE_POLL: Duration = Duration::from_millis(20);
// How long teardown waits for the worker after raising abort before detaching it.
const WORKER_JOIN_LIMIT: Duration = Duration::from_secs(1);

/// Parameters for a capture session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureOpts {
    /// Constant frame rate of the encoded stream.
    pub fps: Fps,
    /// Output container/codec.
    pub format: ClipFormat,
    /// Colour transparent pixels are flattened onto.
    pub bg_rgba: [u8; 4],
    /// Motion-JPEG quality.
    pub jpeg_quality: u8,
}

impl Default for CaptureOpts {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            format: ClipFormat::default(),
            bg_rgba: [0, 0, 0, 255],
            jpeg_quality: 85,
        }
    }
}

/// Finalized output of a stopped capture session.
#[derive(Debug)]
pub struct CapturedStream {
    /// Every chunk in capture order.
    pub chunks: Vec<EncodedChunk>,
    /// Encoder's account of the stream.
    pub summary: CaptureSummary,
    /// MIME type of the concatenated chunks.
    pub content_type: &'static str,
    /// Format that was encoded.
    pub format: ClipFormat,
}

/// Live binding between a [`RenderSurface`] and an encoder session.
///
/// A background worker snapshots each presented frame and pushes it to the encoder, so the
/// render loop never waits on encoding. Consumed by [`stop`](Self::stop) or
/// [`abort`](Self::abort); dropping an unstopped session aborts it.
pub struct StreamCaptureSession {
    inner: Option<Running>,
}

struct Running {
    rx: Receiver<CaptureEvent>,
    worker: Option<JoinHandle<()>>,
    slot: Arc<FrameSlot>,
    abort: CancelToken,
    chunks: Vec<EncodedChunk>,
    format: ClipFormat,
    failed: bool,
    _lease: ResourceLease,
}

impl StreamCaptureSession {
    /// Bind `surface` and open an encoder for it.
    ///
    /// Fails with `UnsupportedFormat` before touching the surface when `encoders` cannot
    /// produce `opts.format`. Does not wait for a first frame.
    pub fn start(
        surface: &RenderSurface,
        encoders: &dyn EncoderProvider,
        opts: CaptureOpts,
        ledger: &ResourceLedger,
    ) -> EngineResult<Self> {
        if !encoders.supports(opts.format) {
            return Err(SynthesisError::unsupported_format(format!(
                "no {} encoder available",
                opts.format
            )));
        }

        let cfg = EncoderConfig {
            frame: surface.canvas(),
            fps: opts.fps,
            bg_rgba: opts.bg_rgba,
            format: opts.format,
            jpeg_quality: opts.jpeg_quality,
        };
        cfg.validate()?;
        let binding = surface.bind_capture()?;
        let (tx, rx) = mpsc::channel();
        let abort = CancelToken::new();
        let encoder = encoders.open(&cfg, ChunkWriter::new(tx.clone()), abort.clone())?;

        let slot = binding.slot.clone();
        let worker_abort = abort.clone();
        let worker = std::thread::Builder::new()
            .name("stillmotion-capture".to_owned())
            .spawn(move || capture_worker(binding, encoder, tx, worker_abort))
            .map_err(|e| SynthesisError::encoder(format!("failed to spawn capture worker: {e}")))?;

        tracing::debug!(format = %opts.format, fps = %opts.fps, "capture started");
        Ok(Self {
            inner: Some(Running {
                rx,
                worker: Some(worker),
                slot,
                abort,
                chunks: Vec::new(),
                format: opts.format,
                failed: false,
                _lease: ledger.lease_capture_session(),
            }),
        })
    }

    /// Chunks delivered so far.
    pub fn chunks(&self) -> &[EncodedChunk] {
        self.inner.as_ref().map_or(&[], |r| r.chunks.as_slice())
    }

    /// Collect chunks delivered since the last call without blocking.
    ///
    /// Returns the number of new chunks, or the encoder's error if it failed mid-run.
    pub fn poll(&mut self) -> EngineResult<usize> {
        let Some(run) = self.inner.as_mut() else {
            return Ok(0);
        };
        let before = run.chunks.len();
        loop {
            match run.rx.try_recv() {
                Ok(CaptureEvent::Chunk { data, timestamp }) => run.push_chunk(data, timestamp),
                Ok(CaptureEvent::Failed(e)) => {
                    run.failed = true;
                    return Err(e);
                }
                // The worker only finishes after stop, which consumes the session.
                Ok(CaptureEvent::Finished(_))
                | Err(TryRecvError::Empty)
                | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(run.chunks.len() - before)
    }

    /// Close the frame stream and let the encoder flush. Never blocks.
    pub fn stop(mut self) -> FinalizingCapture {
        let run = self.inner.take();
        if let Some(run) = &run {
            run.slot.close();
            tracing::debug!(chunks = run.chunks.len(), "capture stopped");
        }
        FinalizingCapture { inner: run }
    }

    /// Tear down immediately, discarding all output.
    pub fn abort(mut self) {
        if let Some(run) = self.inner.take() {
            run.teardown();
        }
    }
}

impl Drop for StreamCaptureSession {
    fn drop(&mut self) {
        if let Some(run) = self.inner.take() {
            tracing::warn!("capture session dropped while running; aborting");
            run.teardown();
        }
    }
}

/// A stopped capture session waiting for the encoder's final data.
pub struct FinalizingCapture {
    inner: Option<Running>,
}

impl FinalizingCapture {
    /// Wait up to `grace` for the encoder to finish.
    ///
    /// Fails with `FinalizeTimeout` when the encoder does not report completion in time, and
    /// with `Cancelled` when `cancel` is raised first. The worker is joined on every path, or
    /// detached if its encoder keeps ignoring abort.
    pub fn await_final(mut self, grace: Duration, cancel: &CancelToken) -> EngineResult<CapturedStream> {
        let Some(mut run) = self.inner.take() else {
            return Err(SynthesisError::EmptyOutput);
        };
        if run.failed {
            run.teardown();
            return Err(SynthesisError::encoder("encoder failed before stop"));
        }

        let deadline = Instant::now() + grace;
        let outcome = loop {
            if cancel.is_cancelled() {
                break Err(SynthesisError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                break Err(SynthesisError::FinalizeTimeout(grace));
            }
            match run.rx.recv_timeout((deadline - now).min(FINALIZE_POLL)) {
                Ok(CaptureEvent::Chunk { data, timestamp }) => run.push_chunk(data, timestamp),
                Ok(CaptureEvent::Finished(summary)) => break Ok(summary),
                Ok(CaptureEvent::Failed(e)) => break Err(e),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(SynthesisError::encoder("capture worker exited without a result"));
                }
            }
        };

        match outcome {
            Ok(summary) => {
                run.join();
                // The encoder's own threads are joined before `Finished` is sent, so anything
                // still queued is final output.
                while let Ok(CaptureEvent::Chunk { data, timestamp }) = run.rx.try_recv() {
                    run.push_chunk(data, timestamp);
                }
                tracing::debug!(
                    chunks = run.chunks.len(),
                    frames = summary.frames,
                    "capture finalized"
                );
                let format = run.format;
                let chunks = std::mem::take(&mut run.chunks);
                drop(run);
                Ok(CapturedStream {
                    chunks,
                    summary,
                    content_type: format.content_type(),
                    format,
                })
            }
            Err(e) => {
                if matches!(e, SynthesisError::FinalizeTimeout(_)) {
                    tracing::warn!(grace_ms = grace.as_millis() as u64, "encoder did not finish in time");
                }
                run.teardown();
                Err(e)
            }
        }
    }

    /// Give up on the final data and tear down.
    pub fn abort(mut self) {
        if let Some(run) = self.inner.take() {
            run.teardown();
        }
    }
}

impl Drop for FinalizingCapture {
    fn drop(&mut self) {
        if let Some(run) = self.inner.take() {
            run.teardown();
        }
    }
}

impl Running {
    fn push_chunk(&mut self, data: Vec<u8>, timestamp: Duration) {
        let seq = self.chunks.len() as u64;
        self.chunks.push(EncodedChunk {
            seq,
            timestamp,
            data,
        });
    }

    fn join(&mut self) {
        if let Some(h) = self.worker.take()
            && h.join().is_err()
        {
            tracing::warn!("capture worker panicked");
        }
    }

    fn teardown(mut self) {
        self.abort.cancel();
        self.slot.close();
        self.slot.wake();
        let Some(h) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + WORKER_JOIN_LIMIT;
        while !h.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        if !h.is_finished() {
            tracing::warn!(
                limit_ms = WORKER_JOIN_LIMIT.as_millis() as u64,
                "encoder ignored abort; detaching capture worker"
            );
            return;
        }
        if h.join().is_err() {
            tracing::warn!("capture worker panicked");
        }
    }
}

fn capture_worker(
    binding: CaptureBinding,
    mut encoder: Box<dyn FrameEncoder>,
    tx: mpsc::Sender<CaptureEvent>,
    abort: CancelToken,
) {
    let mut frame = Vec::with_capacity(binding.canvas.rgba8_len());
    let mut seen = 0u64;
    let mut origin: Option<Duration> = None;
    let mut pushed = 0u64;

    let result = loop {
        match binding.slot.wait_next(seen, &mut frame, &abort) {
            SlotEvent::Frame { generation, pts } => {
                seen = generation;
                let base = *origin.get_or_insert(pts);
                if let Err(e) = encoder.push_frame(&frame, pts.saturating_sub(base)) {
                    encoder.abort();
                    break Err(e);
                }
                pushed += 1;
            }
            SlotEvent::Closed => {
                if pushed == 0 {
                    encoder.abort();
                    break Ok(CaptureSummary::default());
                }
                break encoder.finish();
            }
            SlotEvent::Aborted => {
                encoder.abort();
                return;
            }
        }
    };

    drop(binding);
    let event = match result {
        Ok(summary) => CaptureEvent::Finished(summary),
        Err(e) => {
            tracing::debug!(error = %e, "capture worker failed");
            CaptureEvent::Failed(e)
        }
    };
    let _ = tx.send(event);
}

#[cfg(test)]
#[path = "../../tests/unit/capture/session.rs"]
mod tests;
