//! Animate an image file into a clip.
//!
//! `cargo run --example animate_image -- <input> <output> [style] [duration_ms]`
//!
//! The clip format comes from `STILLMOTION_FORMAT` (webm by default).
use anyhow::Context as _;
use stillmotion::{CancelToken, EngineOpts, MotionStyle, SynthesisConfig, SynthesisController};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let input = args.next().context("usage: animate_image <input> <output> [style] [ms]")?;
    let output = args.next().context("usage: animate_image <input> <output> [style] [ms]")?;
    let style: MotionStyle = args.next().as_deref().unwrap_or("zoom_in").parse()?;
    let duration_ms: u64 = match args.next() {
        Some(v) => v.parse().context("duration_ms must be an integer")?,
        None => stillmotion::DEFAULT_DURATION_MS,
    };

    let bytes = std::fs::read(&input).with_context(|| format!("read '{input}'"))?;
    let mut controller = SynthesisController::new(EngineOpts::from_env())?;
    let cfg = SynthesisConfig::default()
        .with_style(style)
        .with_duration_ms(duration_ms);

    let res = controller.synthesize(bytes, &cfg, &CancelToken::new())?;
    std::fs::write(&output, res.bytes()).with_context(|| format!("write '{output}'"))?;

    println!(
        "{} -> {} ({}, {}x{}, {} frames, {} ms, {} bytes)",
        input,
        output,
        res.content_type(),
        res.frame().width,
        res.frame().height,
        res.frame_count(),
        res.duration().as_millis(),
        res.bytes().len()
    );
    Ok(())
}
