use super::*;

fn cfg(format: ClipFormat, w: u32, h: u32) -> EncoderConfig {
    EncoderConfig {
        frame: Canvas::new(w, h).unwrap(),
        fps: Fps::default(),
        bg_rgba: [0, 0, 0, 255],
        format,
        jpeg_quality: 85,
    }
}

#[test]
fn formats_parse_and_describe_themselves() {
    assert_eq!("WebM".parse::<ClipFormat>().unwrap(), ClipFormat::Webm);
    assert_eq!("h264".parse::<ClipFormat>().unwrap(), ClipFormat::Mp4);
    assert_eq!(" mjpeg ".parse::<ClipFormat>().unwrap(), ClipFormat::Mjpeg);
    assert!("gif".parse::<ClipFormat>().is_err());

    assert_eq!(ClipFormat::default().content_type(), "video/webm");
    assert_eq!(ClipFormat::Mp4.content_type(), "video/mp4");
    for f in ClipFormat::ALL {
        assert_eq!(f.to_string().parse::<ClipFormat>().unwrap(), f);
    }
}

#[test]
fn yuv_formats_require_even_dimensions() {
    assert!(cfg(ClipFormat::Webm, 64, 64).validate().is_ok());
    assert!(cfg(ClipFormat::Webm, 63, 64).validate().is_err());
    assert!(cfg(ClipFormat::Mp4, 64, 9).validate().is_err());
    assert!(cfg(ClipFormat::Mjpeg, 63, 9).validate().is_ok());

    let mut bad_q = cfg(ClipFormat::Mjpeg, 8, 8);
    bad_q.jpeg_quality = 0;
    assert!(bad_q.validate().is_err());
}

#[test]
fn zero_fps_is_rejected_not_divided_by() {
    let mut c = cfg(ClipFormat::Mjpeg, 8, 8);
    c.fps = Fps { num: 0, den: 1 };
    assert_eq!(c.validate().unwrap_err().kind(), crate::ErrorKind::InvalidInput);
    c.fps = Fps { num: 30, den: 0 };
    assert!(c.validate().is_err());

    let (tx, _rx) = mpsc::channel();
    let err = SystemEncoders::new("/nonexistent/ffmpeg-binary")
        .open(&c, ChunkWriter::new(tx), CancelToken::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
}

#[test]
fn cadence_fills_gaps_and_drops_stale_frames() {
    let mut c = FrameCadence::new(Fps::new(10, 1).unwrap());
    assert_eq!(c.place(Duration::ZERO), Some(0));
    assert_eq!(c.place(Duration::from_millis(100)), Some(0));
    // Frames 2 and 3 were skipped.
    assert_eq!(c.place(Duration::from_millis(400)), Some(2));
    // Still slot 4.
    assert_eq!(c.place(Duration::from_millis(420)), None);
    let s = c.summary();
    assert_eq!(s.frames, 5);
    assert_eq!(s.duration, Duration::from_millis(500));
}

#[test]
fn writer_drops_empty_payloads_and_reports_closed_session() {
    let (tx, rx) = mpsc::channel();
    let w = ChunkWriter::new(tx);
    w.emit(Vec::new(), Duration::ZERO).unwrap();
    w.emit(vec![1, 2], Duration::from_millis(3)).unwrap();
    let got: Vec<_> = rx.try_iter().collect();
    assert_eq!(got.len(), 1);
    assert!(matches!(&got[0], CaptureEvent::Chunk { data, .. } if data == &[1, 2]));

    drop(rx);
    let err = w.emit(vec![1], Duration::ZERO).unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::Encoder);
}

#[test]
fn system_encoders_always_offer_mjpeg() {
    let enc = SystemEncoders::new("/nonexistent/ffmpeg-binary");
    assert!(enc.supports(ClipFormat::Mjpeg));
    assert!(!enc.supports(ClipFormat::Webm));
    assert!(!enc.supports(ClipFormat::Mp4));

    let (tx, _rx) = mpsc::channel();
    let err = enc
        .open(
            &cfg(ClipFormat::Webm, 8, 8),
            ChunkWriter::new(tx),
            CancelToken::new(),
        )
        .err()
        .unwrap();
    assert_eq!(err.kind(), crate::ErrorKind::UnsupportedFormat);
}
