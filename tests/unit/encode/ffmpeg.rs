use super::*;
use crate::encode::encoder::CaptureEvent;
use crate::foundation::core::Canvas;
use std::sync::mpsc;

#[test]
fn encoder_listing_is_parsed() {
    let listing = "Encoders:\n V..... = Video\n ------\n V....D libx264              libx264 H.264\n V....D libvpx-vp9           libvpx VP9\n A....D aac                  AAC\n";
    let names = parse_encoder_list(listing);
    assert!(names.iter().any(|n| n == "libx264"));
    assert!(names.iter().any(|n| n == "libvpx-vp9"));
    assert!(!names.iter().any(|n| n == "aac"));
}

#[test]
fn unknown_binary_probes_empty() {
    assert!(probe_encoders(Path::new("/nonexistent/ffmpeg-binary")).is_empty());
}

#[test]
fn webm_stream_comes_out_of_stdout() {
    if !is_ffmpeg_on_path() {
        return;
    }
    let caps = probe_encoders(Path::new("ffmpeg"));
    if !caps.iter().any(|c| c == "libvpx-vp9") {
        return;
    }

    let (tx, rx) = mpsc::channel();
    let cfg = EncoderConfig {
        frame: Canvas::new(32, 32).unwrap(),
        fps: Fps::default(),
        bg_rgba: [0, 0, 0, 255],
        format: ClipFormat::Webm,
        jpeg_quality: 85,
    };
    let mut enc = Box::new(
        FfmpegEncoder::spawn(Path::new("ffmpeg"), &cfg, ChunkWriter::new(tx), CancelToken::new())
            .unwrap(),
    );
    let frame = vec![128u8; 32 * 32 * 4];
    for i in 0..10u64 {
        enc.push_frame(&frame, cfg.fps.frame_time(i)).unwrap();
    }
    let summary = enc.finish().unwrap();
    assert_eq!(summary.frames, 10);

    let bytes: Vec<u8> = rx
        .try_iter()
        .filter_map(|ev| match ev {
            CaptureEvent::Chunk { data, .. } => Some(data),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(&bytes[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
}

#[test]
fn abort_kills_a_running_encoder() {
    if !is_ffmpeg_on_path() {
        return;
    }
    let caps = probe_encoders(Path::new("ffmpeg"));
    if !caps.iter().any(|c| c == "libx264") {
        return;
    }
    let (tx, _rx) = mpsc::channel();
    let cfg = EncoderConfig {
        frame: Canvas::new(16, 16).unwrap(),
        fps: Fps::default(),
        bg_rgba: [0, 0, 0, 255],
        format: ClipFormat::Mp4,
        jpeg_quality: 85,
    };
    let abort = CancelToken::new();
    let mut enc = Box::new(
        FfmpegEncoder::spawn(Path::new("ffmpeg"), &cfg, ChunkWriter::new(tx), abort.clone())
            .unwrap(),
    );
    enc.push_frame(&vec![0u8; 16 * 16 * 4], Duration::ZERO).unwrap();
    abort.cancel();
    let started = std::time::Instant::now();
    FrameEncoder::abort(enc);
    assert!(started.elapsed() < Duration::from_secs(5));
}
