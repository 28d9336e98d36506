use super::*;
use crate::motion::planner::MotionPlanner;
use crate::motion::style::MotionStyle;

fn solid_source(w: u32, h: u32, rgba: [u8; 4]) -> SourceImage {
    let mut px = Vec::with_capacity(w as usize * h as usize * 4);
    for _ in 0..(w * h) {
        px.extend_from_slice(&rgba);
    }
    SourceImage::from_rgba8(w, h, px).unwrap()
}

fn pixel(surface: &RenderSurface, x: u32, y: u32) -> [u8; 4] {
    let w = surface.canvas().width;
    let i = ((y * w + x) * 4) as usize;
    let p = &surface.pixels()[i..i + 4];
    [p[0], p[1], p[2], p[3]]
}

#[test]
fn paint_without_attach_is_rejected() {
    let ledger = ResourceLedger::new();
    let frame = Canvas::new(8, 8).unwrap();
    let mut r = FrameRenderer::new(frame, [0, 0, 0, 255]);
    let mut s = RenderSurface::new(frame, &ledger).unwrap();
    let err = r.paint(&mut s, Viewport::IDENTITY).unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
}

#[test]
fn opaque_source_covers_the_whole_frame() {
    let ledger = ResourceLedger::new();
    let src = solid_source(32, 16, [200, 40, 10, 255]);
    let frame = Canvas::new(16, 16).unwrap();
    let mut r = FrameRenderer::new(frame, [0, 0, 255, 255]);
    let mut s = r.attach(&src, &ledger).unwrap();
    r.paint(&mut s, Viewport::IDENTITY).unwrap();

    assert_eq!(s.frames_painted(), 1);
    for (x, y) in [(0, 0), (15, 0), (0, 15), (15, 15), (8, 8)] {
        let p = pixel(&s, x, y);
        assert_eq!(p[3], 255);
        assert!(p[0] > 150 && p[2] < 60, "pixel ({x},{y}) = {p:?}");
    }
}

#[test]
fn background_shows_through_transparent_source() {
    let ledger = ResourceLedger::new();
    let src = solid_source(4, 4, [255, 255, 255, 0]);
    let frame = Canvas::new(4, 4).unwrap();
    let mut r = FrameRenderer::new(frame, [0, 255, 0, 255]);
    let mut s = r.attach(&src, &ledger).unwrap();
    r.paint(&mut s, Viewport::IDENTITY).unwrap();
    assert_eq!(pixel(&s, 2, 2), [0, 255, 0, 255]);
}

#[test]
fn every_planned_viewport_paints_fully_opaque_frames() {
    let ledger = ResourceLedger::new();
    let src = solid_source(40, 20, [90, 90, 90, 255]);
    let frame = Canvas::new(20, 30).unwrap();
    let planner = MotionPlanner::with_frame(frame);
    let mut r = FrameRenderer::new(frame, [0, 0, 0, 255]);
    let mut s = r.attach(&src, &ledger).unwrap();
    for style in MotionStyle::ALL {
        let path = planner.plan(40, 20, style).unwrap();
        for i in 0..=4 {
            r.paint(&mut s, path.viewport_at(f64::from(i) / 4.0)).unwrap();
            assert!(s.pixels().chunks_exact(4).all(|p| p[3] == 255));
        }
    }
}

#[test]
fn oversized_source_is_downscaled_not_rejected() {
    assert_eq!(fit_texture(Canvas::new(4000, 3000).unwrap()), None);
    let fit = fit_texture(Canvas::new(70_000, 4).unwrap()).unwrap();
    assert_eq!(fit.width, 65_535);
    assert_eq!(fit.height, 4);

    let ledger = ResourceLedger::new();
    let src = solid_source(70_000, 4, [30, 200, 60, 255]);
    let frame = Canvas::new(16, 8).unwrap();
    let path = MotionPlanner::with_frame(frame)
        .plan(70_000, 4, MotionStyle::PanRight)
        .unwrap();
    let mut r = FrameRenderer::new(frame, [255, 0, 255, 255]);
    let mut s = r.attach(&src, &ledger).unwrap();
    for t in [0.0, 0.5, 1.0] {
        r.paint(&mut s, path.viewport_at(t)).unwrap();
        for (x, y) in [(0, 0), (15, 7), (8, 4)] {
            let p = pixel(&s, x, y);
            assert!(p[1] > 150 && p[0] < 80, "t={t} pixel ({x},{y}) = {p:?}");
        }
    }
}

#[test]
fn mismatched_surface_is_rejected() {
    let ledger = ResourceLedger::new();
    let src = solid_source(4, 4, [1, 2, 3, 255]);
    let mut r = FrameRenderer::new(Canvas::new(4, 4).unwrap(), [0, 0, 0, 255]);
    let _own = r.attach(&src, &ledger).unwrap();
    let mut other = RenderSurface::new(Canvas::new(8, 8).unwrap(), &ledger).unwrap();
    assert!(r.paint(&mut other, Viewport::IDENTITY).is_err());
}

#[test]
fn detach_drops_the_image() {
    let ledger = ResourceLedger::new();
    let src = solid_source(2, 2, [1, 2, 3, 255]);
    let mut r = FrameRenderer::new(Canvas::new(2, 2).unwrap(), [0, 0, 0, 255]);
    let mut s = r.attach(&src, &ledger).unwrap();
    r.detach();
    assert!(r.paint(&mut s, Viewport::IDENTITY).is_err());
}

#[cfg(feature = "alloc-track")]
#[test]
fn repeated_paints_do_not_retain_memory() {
    use crate::foundation::alloc_track::AllocProbe;

    let ledger = ResourceLedger::new();
    let src = solid_source(64, 48, [10, 120, 200, 255]);
    let frame = Canvas::new(64, 64).unwrap();
    let path = MotionPlanner::with_frame(frame)
        .plan(64, 48, MotionStyle::KenBurns)
        .unwrap();
    let mut r = FrameRenderer::new(frame, [0, 0, 0, 255]);
    let mut s = r.attach(&src, &ledger).unwrap();
    for i in 0..8 {
        r.paint(&mut s, path.viewport_at(f64::from(i) / 8.0)).unwrap();
    }

    let probe = AllocProbe::start();
    for i in 0..64 {
        r.paint(&mut s, path.viewport_at(f64::from(i) / 64.0)).unwrap();
    }
    let delta = probe.delta();
    assert!(
        delta.retained_bytes() < 64 * 1024,
        "retained {} bytes over 64 paints",
        delta.retained_bytes()
    );
}
