use crate::foundation::error::{EngineResult, SynthesisError};

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Convert straight-alpha RGBA8 to premultiplied RGBA8 in place.
pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u16(u16::from(px[0]), a) as u8;
        px[1] = mul_div255_u16(u16::from(px[1]), a) as u8;
        px[2] = mul_div255_u16(u16::from(px[2]), a) as u8;
    }
}

/// Composite premultiplied RGBA8 over an opaque background, writing opaque RGBA8.
pub(crate) fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> EngineResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(SynthesisError::encoder(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let [r, g, b] = over_bg(s, bg_rgba);
        d[0] = r;
        d[1] = g;
        d[2] = b;
        d[3] = 255;
    }
    Ok(())
}

/// Same as [`flatten_premul_over_bg_to_opaque_rgba8`] but drops the alpha channel.
pub(crate) fn flatten_premul_over_bg_to_rgb8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> EngineResult<()> {
    if !src_premul.len().is_multiple_of(4) || dst.len() / 3 != src_premul.len() / 4 {
        return Err(SynthesisError::encoder(
            "flatten_premul_over_bg_to_rgb8 expects an rgb8 buffer matching the rgba8 source",
        ));
    }

    for (d, s) in dst.chunks_exact_mut(3).zip(src_premul.chunks_exact(4)) {
        d.copy_from_slice(&over_bg(s, bg_rgba));
    }
    Ok(())
}

fn over_bg(s: &[u8], bg_rgba: [u8; 4]) -> [u8; 3] {
    let a = u16::from(s[3]);
    if a == 255 {
        return [s[0], s[1], s[2]];
    }
    let inv = 255u16 - a;
    let c = |src: u8, bg: u8| -> u8 {
        (u16::from(src) + mul_div255_u16(u16::from(bg), inv)).min(255) as u8
    };
    [c(s[0], bg_rgba[0]), c(s[1], bg_rgba[1]), c(s[2], bg_rgba[2])]
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
