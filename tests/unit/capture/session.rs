use super::*;
use crate::foundation::core::Canvas;

/// Emits one 8-byte chunk per frame (the rebased pts in micros).
struct Recording;

struct RecordingEncoder {
    out: ChunkWriter,
    frames: u64,
}

impl FrameEncoder for RecordingEncoder {
    fn push_frame(&mut self, _frame: &[u8], pts: Duration) -> EngineResult<()> {
        self.frames += 1;
        self.out
            .emit((pts.as_micros() as u64).to_le_bytes().to_vec(), pts)
    }

    fn finish(self: Box<Self>) -> EngineResult<CaptureSummary> {
        self.out.emit(b"END".to_vec(), Duration::ZERO)?;
        Ok(CaptureSummary {
            frames: self.frames,
            duration: Duration::from_millis(self.frames * 100),
        })
    }

    fn abort(self: Box<Self>) {}
}

impl EncoderProvider for Recording {
    fn supports(&self, _format: ClipFormat) -> bool {
        true
    }

    fn open(
        &self,
        _cfg: &EncoderConfig,
        out: ChunkWriter,
        _abort: CancelToken,
    ) -> EngineResult<Box<dyn FrameEncoder>> {
        Ok(Box::new(RecordingEncoder { out, frames: 0 }))
    }
}

/// Never finishes until aborted.
struct Hanging;

struct HangingEncoder {
    abort: CancelToken,
}

impl FrameEncoder for HangingEncoder {
    fn push_frame(&mut self, _frame: &[u8], _pts: Duration) -> EngineResult<()> {
        Ok(())
    }

    fn finish(self: Box<Self>) -> EngineResult<CaptureSummary> {
        while !self.abort.wait_timeout(Duration::from_millis(5)) {}
        Err(SynthesisError::encoder("aborted"))
    }

    fn abort(self: Box<Self>) {}
}

impl EncoderProvider for Hanging {
    fn supports(&self, _format: ClipFormat) -> bool {
        true
    }

    fn open(
        &self,
        _cfg: &EncoderConfig,
        _out: ChunkWriter,
        abort: CancelToken,
    ) -> EngineResult<Box<dyn FrameEncoder>> {
        Ok(Box::new(HangingEncoder { abort }))
    }
}

/// Ignores abort; `finish` only returns once `release` is raised.
struct Stubborn {
    release: CancelToken,
}

struct StubbornEncoder {
    release: CancelToken,
}

impl FrameEncoder for StubbornEncoder {
    fn push_frame(&mut self, _frame: &[u8], _pts: Duration) -> EngineResult<()> {
        Ok(())
    }

    fn finish(self: Box<Self>) -> EngineResult<CaptureSummary> {
        while !self.release.wait_timeout(Duration::from_millis(5)) {}
        Ok(CaptureSummary::default())
    }

    fn abort(self: Box<Self>) {}
}

impl EncoderProvider for Stubborn {
    fn supports(&self, _format: ClipFormat) -> bool {
        true
    }

    fn open(
        &self,
        _cfg: &EncoderConfig,
        _out: ChunkWriter,
        _abort: CancelToken,
    ) -> EngineResult<Box<dyn FrameEncoder>> {
        Ok(Box::new(StubbornEncoder {
            release: self.release.clone(),
        }))
    }
}

/// Fails on the second frame.
struct Flaky;

struct FlakyEncoder {
    frames: u64,
}

impl FrameEncoder for FlakyEncoder {
    fn push_frame(&mut self, _frame: &[u8], _pts: Duration) -> EngineResult<()> {
        self.frames += 1;
        if self.frames >= 2 {
            return Err(SynthesisError::encoder("codec exploded"));
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> EngineResult<CaptureSummary> {
        Ok(CaptureSummary::default())
    }

    fn abort(self: Box<Self>) {}
}

impl EncoderProvider for Flaky {
    fn supports(&self, _format: ClipFormat) -> bool {
        true
    }

    fn open(
        &self,
        _cfg: &EncoderConfig,
        _out: ChunkWriter,
        _abort: CancelToken,
    ) -> EngineResult<Box<dyn FrameEncoder>> {
        Ok(Box::new(FlakyEncoder { frames: 0 }))
    }
}

struct Nothing;

impl EncoderProvider for Nothing {
    fn supports(&self, _format: ClipFormat) -> bool {
        false
    }

    fn open(
        &self,
        _cfg: &EncoderConfig,
        _out: ChunkWriter,
        _abort: CancelToken,
    ) -> EngineResult<Box<dyn FrameEncoder>> {
        Err(SynthesisError::unsupported_format("none"))
    }
}

fn surface(ledger: &ResourceLedger) -> RenderSurface {
    RenderSurface::new(Canvas::new(4, 4).unwrap(), ledger).unwrap()
}

#[test]
fn unsupported_format_fails_before_binding() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let err = StreamCaptureSession::start(&s, &Nothing, CaptureOpts::default(), &ledger)
        .err()
        .unwrap();
    assert_eq!(err.kind(), crate::ErrorKind::UnsupportedFormat);
    assert!(!s.is_captured());
    assert_eq!(ledger.stats().capture_sessions_created, 0);
}

#[test]
fn second_session_on_same_surface_is_rejected() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let first = StreamCaptureSession::start(&s, &Recording, CaptureOpts::default(), &ledger).unwrap();
    assert!(StreamCaptureSession::start(&s, &Recording, CaptureOpts::default(), &ledger).is_err());
    first.abort();
    assert!(!s.is_captured());
    assert_eq!(ledger.stats().capture_sessions_active, 0);
}

#[test]
fn frames_become_ordered_gap_free_chunks() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let mut session =
        StreamCaptureSession::start(&s, &Recording, CaptureOpts::default(), &ledger).unwrap();

    for i in 0..5u64 {
        s.present(Duration::from_millis(500 + i * 100));
        // Let the worker pick each frame up so none are coalesced.
        let deadline = Instant::now() + Duration::from_secs(2);
        while session.chunks().len() < (i + 1) as usize && Instant::now() < deadline {
            session.poll().unwrap();
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    let out = session
        .stop()
        .await_final(Duration::from_secs(2), &CancelToken::new())
        .unwrap();
    assert_eq!(out.summary.frames, 5);
    assert_eq!(out.chunks.len(), 6);
    for (i, c) in out.chunks.iter().enumerate() {
        assert_eq!(c.seq, i as u64);
    }
    // First frame is rebased to zero.
    assert_eq!(out.chunks[0].data, 0u64.to_le_bytes().to_vec());
    assert_eq!(out.chunks[4].timestamp, Duration::from_millis(400));
    assert_eq!(out.chunks[5].data, b"END".to_vec());
    assert_eq!(ledger.stats().capture_sessions_active, 0);
    assert!(!s.is_captured());
}

#[test]
fn stop_without_frames_yields_empty_stream() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let session =
        StreamCaptureSession::start(&s, &Recording, CaptureOpts::default(), &ledger).unwrap();
    let out = session
        .stop()
        .await_final(Duration::from_secs(2), &CancelToken::new())
        .unwrap();
    assert!(out.chunks.is_empty());
    assert_eq!(out.summary.frames, 0);
}

#[test]
fn hanging_encoder_times_out_and_is_joined() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let session =
        StreamCaptureSession::start(&s, &Hanging, CaptureOpts::default(), &ledger).unwrap();
    s.present(Duration::ZERO);
    std::thread::sleep(Duration::from_millis(30));

    let started = Instant::now();
    let err = session
        .stop()
        .await_final(Duration::from_millis(100), &CancelToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::FinalizeTimeout);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(ledger.stats().capture_sessions_active, 0);
}

#[test]
fn cancel_interrupts_finalization() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let session =
        StreamCaptureSession::start(&s, &Hanging, CaptureOpts::default(), &ledger).unwrap();
    s.present(Duration::ZERO);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = session
        .stop()
        .await_final(Duration::from_secs(10), &cancel)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(ledger.stats().capture_sessions_active, 0);
}

#[test]
fn mid_run_encoder_failure_surfaces_through_poll() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let mut session =
        StreamCaptureSession::start(&s, &Flaky, CaptureOpts::default(), &ledger).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut i = 0u64;
    let err = loop {
        assert!(Instant::now() < deadline, "encoder failure never surfaced");
        s.present(Duration::from_millis(i * 33));
        i += 1;
        std::thread::sleep(Duration::from_millis(5));
        if let Err(e) = session.poll() {
            break e;
        }
    };
    assert_eq!(err.kind(), crate::ErrorKind::Encoder);
    session.abort();
    assert_eq!(ledger.stats().capture_sessions_active, 0);
}

#[test]
fn dropping_a_running_session_aborts_it() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    {
        let _session =
            StreamCaptureSession::start(&s, &Hanging, CaptureOpts::default(), &ledger).unwrap();
        s.present(Duration::ZERO);
    }
    assert_eq!(ledger.stats().capture_sessions_active, 0);
    assert!(!s.is_captured());
}

#[test]
fn encoder_ignoring_abort_is_detached_after_a_bounded_wait() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let release = CancelToken::new();
    let provider = Stubborn {
        release: release.clone(),
    };
    let session = StreamCaptureSession::start(&s, &provider, CaptureOpts::default(), &ledger).unwrap();
    s.present(Duration::ZERO);
    std::thread::sleep(Duration::from_millis(30));

    let started = Instant::now();
    let err = session
        .stop()
        .await_final(Duration::from_millis(100), &CancelToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::FinalizeTimeout);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(ledger.stats().capture_sessions_active, 0);

    // The detached worker still exits once its encoder returns.
    release.cancel();
    let deadline = Instant::now() + Duration::from_secs(2);
    while s.is_captured() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!s.is_captured());
}

#[test]
fn zero_fps_is_rejected_before_binding() {
    let ledger = ResourceLedger::new();
    let s = surface(&ledger);
    let opts = CaptureOpts {
        fps: Fps { num: 0, den: 1 },
        ..CaptureOpts::default()
    };
    let err = StreamCaptureSession::start(&s, &Recording, opts, &ledger)
        .err()
        .unwrap();
    assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    assert!(!s.is_captured());
    assert_eq!(ledger.stats().capture_sessions_created, 0);
}
