use std::io::{Read, Write as _};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::chunk::CaptureSummary;
use crate::encode::encoder::{ChunkWriter, ClipFormat, EncoderConfig, FrameCadence, FrameEncoder};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::Fps;
use crate::foundation::error::{EngineResult, SynthesisError};
use crate::foundation::math::flatten_premul_over_bg_to_opaque_rgba8;

const STDOUT_READ_BUF: usize = 64 * 1024;
const EXIT_POLL: Duration = Duration::from_millis(10);
const WATCHDOG_POLL: Duration = Duration::from_millis(25);

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Names of the video encoders compiled into `ffmpeg`; empty if it cannot be run.
pub(crate) fn probe_encoders(ffmpeg: &Path) -> Vec<String> {
    let out = match Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
    {
        Ok(out) if out.status.success() => out,
        Ok(out) => {
            tracing::debug!(status = %out.status, "ffmpeg -encoders failed");
            return Vec::new();
        }
        Err(e) => {
            tracing::debug!(error = %e, ffmpeg = %ffmpeg.display(), "ffmpeg not runnable");
            return Vec::new();
        }
    };
    parse_encoder_list(&String::from_utf8_lossy(&out.stdout))
}

// Lines look like " V....D libx264              libx264 H.264 / AVC ...".
fn parse_encoder_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let flags = cols.next()?;
            let name = cols.next()?;
            (flags.len() == 6 && flags.starts_with('V')).then(|| name.to_owned())
        })
        .collect()
}

pub(crate) fn codec_for(format: ClipFormat) -> Option<&'static str> {
    match format {
        ClipFormat::Webm => Some("libvpx-vp9"),
        ClipFormat::Mp4 => Some("libx264"),
        ClipFormat::Mjpeg => None,
    }
}

fn output_args(format: ClipFormat) -> EngineResult<&'static [&'static str]> {
    match format {
        ClipFormat::Webm => Ok(&[
            "-c:v",
            "libvpx-vp9",
            "-b:v",
            "0",
            "-crf",
            "32",
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-pix_fmt",
            "yuv420p",
            "-f",
            "webm",
            "pipe:1",
        ]),
        ClipFormat::Mp4 => Ok(&[
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "frag_keyframe+empty_moov+default_base_moof",
            "-f",
            "mp4",
            "pipe:1",
        ]),
        ClipFormat::Mjpeg => Err(SynthesisError::unsupported_format(
            "mjpeg is not encoded through ffmpeg",
        )),
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // rawvideo input takes its rate from `-r` placed before `-i`.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

/// Encoder session backed by a system `ffmpeg` process.
///
/// Raw frames go to stdin; the container stream is read from stdout on a separate thread and
/// forwarded as chunks while encoding is still in progress.
pub(crate) struct FfmpegEncoder {
    child: Arc<Mutex<Child>>,
    stdin: Option<ChildStdin>,
    stdout_reader: Option<JoinHandle<EngineResult<()>>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    watchdog: Option<JoinHandle<()>>,
    watchdog_stop: CancelToken,
    abort: CancelToken,
    bg_rgba: [u8; 4],
    frame_len: usize,
    scratch: Vec<u8>,
    have_previous: bool,
    cadence: FrameCadence,
    last_pts_us: Arc<AtomicU64>,
}

impl FfmpegEncoder {
    pub(crate) fn spawn(
        ffmpeg: &Path,
        cfg: &EncoderConfig,
        out: ChunkWriter,
        abort: CancelToken,
    ) -> EngineResult<Self> {
        cfg.validate()?;

        let mut cmd = Command::new(ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.frame.width, cfg.frame.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0", "-an"]);
        cmd.args(output_args(cfg.format)?);

        let mut child = cmd.spawn().map_err(|e| {
            SynthesisError::unsupported_format(format!(
                "failed to spawn '{}' (is it installed and on PATH?): {e}",
                ffmpeg.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SynthesisError::encoder("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SynthesisError::encoder("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SynthesisError::encoder("failed to open ffmpeg stderr (unexpected)"))?;

        let last_pts_us = Arc::new(AtomicU64::new(0));
        let stdout_reader = {
            let last_pts_us = last_pts_us.clone();
            std::thread::spawn(move || -> EngineResult<()> {
                let mut buf = vec![0u8; STDOUT_READ_BUF];
                loop {
                    let n = stdout.read(&mut buf).map_err(|e| {
                        SynthesisError::encoder(format!("ffmpeg stdout read failed: {e}"))
                    })?;
                    if n == 0 {
                        return Ok(());
                    }
                    let ts = Duration::from_micros(last_pts_us.load(Ordering::Acquire));
                    out.emit(buf[..n].to_vec(), ts)?;
                }
            })
        };
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let child = Arc::new(Mutex::new(child));
        let watchdog_stop = CancelToken::new();
        let watchdog = {
            let child = child.clone();
            let abort = abort.clone();
            let stop = watchdog_stop.clone();
            std::thread::spawn(move || {
                while !stop.is_cancelled() {
                    if abort.wait_timeout(WATCHDOG_POLL) {
                        let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
                        let _ = child.kill();
                        tracing::warn!("ffmpeg killed on abort");
                        return;
                    }
                }
            })
        };

        tracing::debug!(
            format = %cfg.format,
            w = cfg.frame.width,
            h = cfg.frame.height,
            fps = %cfg.fps,
            "ffmpeg encoder started"
        );

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout_reader: Some(stdout_reader),
            stderr_drain: Some(stderr_drain),
            watchdog: Some(watchdog),
            watchdog_stop,
            abort,
            bg_rgba: cfg.bg_rgba,
            frame_len: cfg.frame.rgba8_len(),
            scratch: vec![0u8; cfg.frame.rgba8_len()],
            have_previous: false,
            cadence: FrameCadence::new(cfg.fps),
            last_pts_us,
        })
    }

    fn write_scratch(&mut self, times: u64) -> EngineResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SynthesisError::encoder("ffmpeg encoder is already finalized"));
        };
        for _ in 0..times {
            stdin.write_all(&self.scratch).map_err(|e| {
                SynthesisError::encoder(format!("failed to write frame to ffmpeg stdin: {e}"))
            })?;
        }
        Ok(())
    }

    fn lock_child(&self) -> std::sync::MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_exit(&self) -> EngineResult<std::process::ExitStatus> {
        loop {
            let polled = self.lock_child().try_wait().map_err(|e| {
                SynthesisError::encoder(format!("failed to wait for ffmpeg to finish: {e}"))
            })?;
            if let Some(status) = polled {
                return Ok(status);
            }
            if self.abort.wait_timeout(EXIT_POLL) {
                let mut child = self.lock_child();
                let _ = child.kill();
                let _ = child.wait();
                return Err(SynthesisError::encoder("ffmpeg aborted before finishing"));
            }
        }
    }

    fn join_threads(&mut self) -> (EngineResult<()>, Vec<u8>) {
        self.watchdog_stop.cancel();
        if let Some(h) = self.watchdog.take() {
            let _ = h.join();
        }
        let stdout_res = match self.stdout_reader.take() {
            Some(h) => h
                .join()
                .unwrap_or_else(|_| Err(SynthesisError::encoder("ffmpeg stdout thread panicked"))),
            None => Ok(()),
        };
        let stderr_bytes = match self.stderr_drain.take() {
            Some(h) => h.join().ok().and_then(Result::ok).unwrap_or_default(),
            None => Vec::new(),
        };
        (stdout_res, stderr_bytes)
    }

    fn kill_and_reap(&mut self) {
        drop(self.stdin.take());
        {
            let mut child = self.lock_child();
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
        let _ = self.join_threads();
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn push_frame(&mut self, frame_premul: &[u8], pts: Duration) -> EngineResult<()> {
        if frame_premul.len() != self.frame_len {
            return Err(SynthesisError::encoder(
                "frame size mismatch with encoder configuration",
            ));
        }
        let Some(repeats) = self.cadence.place(pts) else {
            return Ok(());
        };
        if self.have_previous && repeats > 0 {
            self.write_scratch(repeats)?;
        }
        flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, frame_premul, self.bg_rgba)?;
        let times = if self.have_previous { 1 } else { repeats + 1 };
        self.have_previous = true;
        self.last_pts_us.store(
            u64::try_from(pts.as_micros()).unwrap_or(u64::MAX),
            Ordering::Release,
        );
        self.write_scratch(times)
    }

    fn finish(mut self: Box<Self>) -> EngineResult<CaptureSummary> {
        drop(self.stdin.take());
        let status = self.wait_exit();
        let (stdout_res, stderr_bytes) = self.join_threads();
        let status = status?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(SynthesisError::encoder(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        stdout_res?;
        let summary = self.cadence.summary();
        tracing::debug!(frames = summary.frames, "ffmpeg encoder finished");
        Ok(summary)
    }

    fn abort(mut self: Box<Self>) {
        self.kill_and_reap();
        tracing::debug!("ffmpeg encoder aborted");
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.stdin.is_some() || self.watchdog.is_some() {
            self.kill_and_reap();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
