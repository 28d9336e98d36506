use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::foundation::cancel::CancelToken;
use crate::foundation::core::Canvas;
use crate::foundation::error::{EngineResult, SynthesisError};
use crate::session::ledger::{ResourceLedger, ResourceLease};

// Bounds how long a capture worker sleeps before re-checking its abort token.
const SLOT_POLL: Duration = Duration::from_millis(25);

/// Off-screen drawing target for one synthesis run.
///
/// The painter mutates `pixmap` in place; [`RenderSurface::present`] copies the finished frame
/// into the shared [`FrameSlot`], which is the only thing a capture worker ever reads.
pub struct RenderSurface {
    canvas: Canvas,
    pub(crate) pixmap: vello_cpu::Pixmap,
    slot: Arc<FrameSlot>,
    capture_bound: Arc<AtomicBool>,
    frames_painted: u64,
    _lease: ResourceLease,
}

impl RenderSurface {
    pub(crate) fn new(canvas: Canvas, ledger: &ResourceLedger) -> EngineResult<Self> {
        let (w, h) = canvas.to_u16()?;
        Ok(Self {
            canvas,
            pixmap: vello_cpu::Pixmap::new(w, h),
            slot: Arc::new(FrameSlot::new(canvas.rgba8_len())),
            capture_bound: Arc::new(AtomicBool::new(false)),
            frames_painted: 0,
            _lease: ledger.lease_surface(),
        })
    }

    /// Surface dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Number of paints completed on this surface.
    pub fn frames_painted(&self) -> u64 {
        self.frames_painted
    }

    /// Premultiplied RGBA8 pixels of the most recent paint.
    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    /// Whether a capture session is currently bound to this surface.
    pub fn is_captured(&self) -> bool {
        self.capture_bound.load(Ordering::Acquire)
    }

    pub(crate) fn mark_painted(&mut self) {
        self.frames_painted += 1;
    }

    /// Publish the most recently painted frame to the capture slot with presentation time `pts`.
    pub fn present(&self, pts: Duration) {
        self.slot.publish(self.pixmap.data_as_u8_slice(), pts);
    }

    /// Claim the surface for a capture session. Fails if another session already holds it.
    pub(crate) fn bind_capture(&self) -> EngineResult<CaptureBinding> {
        if self
            .capture_bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SynthesisError::invalid_input(
                "render surface already has an active capture session",
            ));
        }
        Ok(CaptureBinding {
            canvas: self.canvas,
            slot: self.slot.clone(),
            bound: self.capture_bound.clone(),
        })
    }
}

/// Exclusive claim of a surface's frame stream. Releases the claim on drop.
pub(crate) struct CaptureBinding {
    pub(crate) canvas: Canvas,
    pub(crate) slot: Arc<FrameSlot>,
    bound: Arc<AtomicBool>,
}

impl Drop for CaptureBinding {
    fn drop(&mut self) {
        self.slot.close();
        self.bound.store(false, Ordering::Release);
    }
}

/// Latest-frame mailbox between the render loop and a capture worker.
///
/// Holds exactly one frame buffer, overwritten on every publish, so a slow reader skips
/// intermediate frames instead of queueing them.
pub(crate) struct FrameSlot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

struct SlotState {
    data: Vec<u8>,
    generation: u64,
    pts: Duration,
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotEvent {
    /// A frame newer than the caller's last one was copied out.
    Frame { generation: u64, pts: Duration },
    /// The producer closed the stream and every published frame has been observed.
    Closed,
    /// The abort token was raised.
    Aborted,
}

impl FrameSlot {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            state: Mutex::new(SlotState {
                data: vec![0u8; len],
                generation: 0,
                pts: Duration::ZERO,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publish(&self, frame: &[u8], pts: Duration) {
        let mut st = self.lock();
        if st.closed || st.data.len() != frame.len() {
            return;
        }
        st.data.copy_from_slice(frame);
        st.generation += 1;
        st.pts = pts;
        self.cond.notify_all();
    }

    pub(crate) fn close(&self) {
        let mut st = self.lock();
        st.closed = true;
        self.cond.notify_all();
    }

    pub(crate) fn wake(&self) {
        self.cond.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Block until a frame newer than `seen` exists, the slot closes, or `abort` is raised.
    ///
    /// A closed slot still hands out its last unseen frame before reporting `Closed`, so a stop
    /// issued right after the final paint never loses that frame.
    pub(crate) fn wait_next(&self, seen: u64, out: &mut Vec<u8>, abort: &CancelToken) -> SlotEvent {
        let mut st = self.lock();
        loop {
            if abort.is_cancelled() {
                return SlotEvent::Aborted;
            }
            if st.generation > seen {
                out.resize(st.data.len(), 0);
                out.copy_from_slice(&st.data);
                return SlotEvent::Frame {
                    generation: st.generation,
                    pts: st.pts,
                };
            }
            if st.closed {
                return SlotEvent::Closed;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(st, SLOT_POLL)
                .unwrap_or_else(PoisonError::into_inner);
            st = guard;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
