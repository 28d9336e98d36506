use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::assemble::clip::{ClipMeta, EncodedClipAssembler, SynthesisResult};
use crate::assemble::registry::ClipRegistry;
use crate::assets::decode::ImageInput;
use crate::capture::session::StreamCaptureSession;
use crate::encode::encoder::{EncoderProvider, SystemEncoders};
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{EngineResult, SynthesisError};
use crate::motion::planner::{MotionPath, MotionPlanner};
use crate::render::renderer::FrameRenderer;
use crate::render::surface::RenderSurface;
use crate::session::config::{EngineOpts, ResolvedConfig, SynthesisConfig};
use crate::session::ledger::{ResourceLedger, ResourceStats};

/// Lifecycle of one synthesis run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SynthesisState {
    /// No run in progress.
    #[default]
    Idle,
    /// Decoding input and planning the camera path.
    Planning,
    /// Tick loop is painting frames into the captured surface.
    Rendering,
    /// Capture stopped, waiting for the encoder's final data.
    Finalizing,
    /// The run produced a result.
    Done,
    /// The run was cancelled or failed; everything it allocated has been released.
    Aborted,
}

impl SynthesisState {
    /// `Done` or `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// Orchestrates plan, render, capture and assembly for single-image clips.
///
/// Runs are sequential (`&mut self`); each allocates a fresh surface and capture session and
/// releases both before returning, whatever the outcome.
pub struct SynthesisController {
    opts: EngineOpts,
    encoders: Arc<dyn EncoderProvider>,
    registry: ClipRegistry,
    ledger: ResourceLedger,
    state: SynthesisState,
    transitions: Vec<SynthesisState>,
}

impl SynthesisController {
    /// Controller using the system encoders.
    pub fn new(opts: EngineOpts) -> EngineResult<Self> {
        let encoders = Arc::new(SystemEncoders::new(opts.ffmpeg.clone()));
        Self::with_encoders(opts, encoders)
    }

    /// Controller using a custom encoder provider.
    pub fn with_encoders(opts: EngineOpts, encoders: Arc<dyn EncoderProvider>) -> EngineResult<Self> {
        opts.validate()?;
        Ok(Self {
            opts,
            encoders,
            registry: ClipRegistry::new(),
            ledger: ResourceLedger::new(),
            state: SynthesisState::Idle,
            transitions: Vec::new(),
        })
    }

    /// Register results in `registry` instead of a private one.
    pub fn with_registry(mut self, registry: ClipRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Options the controller was built with.
    pub fn opts(&self) -> &EngineOpts {
        &self.opts
    }

    /// Registry results are published in.
    pub fn registry(&self) -> &ClipRegistry {
        &self.registry
    }

    /// Ledger tracking surfaces and capture sessions.
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Current resource counters.
    pub fn resource_stats(&self) -> ResourceStats {
        self.ledger.stats()
    }

    /// State after the most recent transition.
    pub fn state(&self) -> SynthesisState {
        self.state
    }

    /// States the most recent run passed through, starting with `Idle`.
    pub fn last_transitions(&self) -> &[SynthesisState] {
        &self.transitions
    }

    /// Animate `input` into a clip.
    ///
    /// Blocks for roughly the clip duration: frames are painted in real time. Raising `cancel`
    /// from another thread stops the run at the next wait point with `Cancelled`.
    #[tracing::instrument(skip_all, fields(format = %self.opts.format, fps = %self.opts.fps))]
    pub fn synthesize(
        &mut self,
        input: impl Into<ImageInput>,
        cfg: &SynthesisConfig,
        cancel: &CancelToken,
    ) -> EngineResult<SynthesisResult> {
        self.transitions.clear();
        self.state = SynthesisState::Idle;
        self.transitions.push(SynthesisState::Idle);

        let out = self.run(input.into(), cfg, cancel);
        match &out {
            Ok(res) => {
                self.transition(SynthesisState::Done);
                tracing::debug!(url = res.url(), frames = res.frame_count(), "synthesis done");
            }
            Err(e) => {
                self.transition(SynthesisState::Aborted);
                if e.kind().is_failure() {
                    tracing::warn!(error = %e, "synthesis aborted");
                } else {
                    tracing::debug!("synthesis cancelled");
                }
            }
        }
        out
    }

    fn transition(&mut self, next: SynthesisState) {
        tracing::debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn run(
        &mut self,
        input: ImageInput,
        cfg: &SynthesisConfig,
        cancel: &CancelToken,
    ) -> EngineResult<SynthesisResult> {
        self.transition(SynthesisState::Planning);
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        let source = input.into_source()?;
        let resolved = cfg.resolve(&source, self.opts.format)?;
        let path = MotionPlanner::with_frame(resolved.frame).plan(
            source.width(),
            source.height(),
            resolved.style,
        )?;
        if !self.encoders.supports(self.opts.format) {
            return Err(SynthesisError::unsupported_format(format!(
                "no {} encoder available",
                self.opts.format
            )));
        }

        self.transition(SynthesisState::Rendering);
        let mut renderer = FrameRenderer::new(resolved.frame, self.opts.bg_rgba);
        let mut surface = renderer.attach(&source, &self.ledger)?;
        let mut capture = StreamCaptureSession::start(
            &surface,
            self.encoders.as_ref(),
            self.opts.capture_opts(),
            &self.ledger,
        )?;

        let ticked = self.tick_loop(
            &mut renderer,
            &mut surface,
            &mut capture,
            &path,
            &resolved,
            cancel,
        );
        if let Err(e) = ticked {
            capture.abort();
            drop(surface);
            return Err(e);
        }

        self.transition(SynthesisState::Finalizing);
        let finalized = capture
            .stop()
            .await_final(self.opts.finalize_grace, cancel);
        drop(surface);
        renderer.detach();
        let stream = finalized?;

        let frame_count = stream.summary.frames;
        EncodedClipAssembler::new(self.registry.clone()).finalize(
            stream.chunks,
            ClipMeta {
                format: stream.format,
                frame: resolved.frame,
                frame_count,
                duration: stream.summary.duration,
            },
        )
    }

    fn tick_loop(
        &self,
        renderer: &mut FrameRenderer,
        surface: &mut RenderSurface,
        capture: &mut StreamCaptureSession,
        path: &MotionPath,
        resolved: &ResolvedConfig,
        cancel: &CancelToken,
    ) -> EngineResult<()> {
        let fps = self.opts.fps;
        let duration = resolved.duration;
        let started = Instant::now();
        let mut index = 0u64;
        loop {
            let elapsed = fps.frame_time(index);
            let deadline = started + elapsed;
            let now = Instant::now();
            if deadline > now && cancel.wait_timeout(deadline - now) {
                return Err(SynthesisError::Cancelled);
            }
            if cancel.is_cancelled() {
                return Err(SynthesisError::Cancelled);
            }

            let t = normalized_time(elapsed, duration);
            renderer.paint(surface, path.viewport_at(t))?;
            surface.present(elapsed);
            capture.poll()?;

            if t >= 1.0 {
                tracing::debug!(ticks = index + 1, "tick loop complete");
                return Ok(());
            }
            index += 1;
        }
    }
}

fn normalized_time(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
}

#[cfg(test)]
#[path = "../../tests/unit/session/controller.rs"]
mod tests;
