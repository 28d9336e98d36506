use std::sync::Arc;

use crate::assets::decode::SourceImage;
use crate::foundation::core::{Affine, Canvas};
use crate::foundation::error::{EngineResult, SynthesisError};
use crate::motion::planner::Viewport;
use crate::render::surface::RenderSurface;
use crate::session::ledger::ResourceLedger;

/// Draws a source image into a [`RenderSurface`] through a [`Viewport`].
///
/// The image paint and the rasterizer context are built once per attach and reused for every
/// frame, so steady-state painting does not allocate per frame.
pub struct FrameRenderer {
    frame: Canvas,
    bg_rgba: [u8; 4],
    ctx: Option<vello_cpu::RenderContext>,
    attached: Option<Attached>,
}

struct Attached {
    source: Canvas,
    // Size of the uploaded pixmap; smaller than `source` when the source was downscaled.
    texels: Canvas,
    paint: vello_cpu::Image,
}

// Largest edge the rasterizer accepts.
const MAX_TEXTURE_EDGE: u32 = u16::MAX as u32;

impl FrameRenderer {
    /// Renderer producing `frame`-sized output over an opaque `bg_rgba` fill.
    pub fn new(frame: Canvas, bg_rgba: [u8; 4]) -> Self {
        Self {
            frame,
            bg_rgba,
            ctx: None,
            attached: None,
        }
    }

    /// Output frame dimensions.
    pub fn frame(&self) -> Canvas {
        self.frame
    }

    /// Bind `source` as the image to draw and allocate a fresh surface for it.
    ///
    /// Sources with an edge above 65535 px are downscaled to fit before upload; viewports still
    /// address the original source coordinates.
    #[tracing::instrument(skip_all, fields(src_w = source.width(), src_h = source.height()))]
    pub fn attach(
        &mut self,
        source: &SourceImage,
        ledger: &ResourceLedger,
    ) -> EngineResult<RenderSurface> {
        let (texels, pixmap) = match fit_texture(source.canvas()) {
            None => (
                source.canvas(),
                pixmap_from_premul_bytes(source.rgba8_premul(), source.canvas())?,
            ),
            Some(fit) => {
                tracing::debug!(fit_w = fit.width, fit_h = fit.height, "downscaling oversized source");
                let bytes = downscale_premul(source.rgba8_premul(), source.canvas(), fit)?;
                (fit, pixmap_from_premul_bytes(&bytes, fit)?)
            }
        };
        self.attached = Some(Attached {
            source: source.canvas(),
            texels,
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
        });
        let surface = RenderSurface::new(self.frame, ledger)?;
        tracing::debug!(
            frame_w = self.frame.width,
            frame_h = self.frame.height,
            "render surface attached"
        );
        Ok(surface)
    }

    /// Drop the bound image paint.
    pub fn detach(&mut self) {
        self.attached = None;
    }

    /// Paint one frame of the attached image through `viewport` into `surface`.
    pub fn paint(&mut self, surface: &mut RenderSurface, viewport: Viewport) -> EngineResult<()> {
        let attached = self
            .attached
            .as_ref()
            .ok_or_else(|| SynthesisError::invalid_input("renderer has no attached image"))?;
        if surface.canvas() != self.frame {
            return Err(SynthesisError::invalid_input(format!(
                "surface is {}x{}, renderer frame is {}x{}",
                surface.canvas().width,
                surface.canvas().height,
                self.frame.width,
                self.frame.height
            )));
        }

        let (w, h) = self.frame.to_u16()?;
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        ctx.reset();

        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        let [r, g, b, _] = self.bg_rgba;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, 255));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.frame.width),
            f64::from(self.frame.height),
        ));

        let texel_to_source = Affine::scale_non_uniform(
            f64::from(attached.source.width) / f64::from(attached.texels.width),
            f64::from(attached.source.height) / f64::from(attached.texels.height),
        );
        let xf = viewport.to_affine(attached.source, self.frame) * texel_to_source;
        ctx.set_transform(affine_to_cpu(xf));
        ctx.set_paint(attached.paint.clone());
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(attached.texels.width),
            f64::from(attached.texels.height),
        ));

        ctx.flush();
        ctx.render_to_pixmap(&mut surface.pixmap);
        self.ctx = Some(ctx);
        surface.mark_painted();
        Ok(())
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

/// Size an oversized source must be reduced to, or `None` if it fits as is.
fn fit_texture(source: Canvas) -> Option<Canvas> {
    let longest = source.width.max(source.height);
    if longest <= MAX_TEXTURE_EDGE {
        return None;
    }
    let scale = f64::from(MAX_TEXTURE_EDGE) / f64::from(longest);
    let edge = |v: u32| ((f64::from(v) * scale).round() as u32).clamp(1, MAX_TEXTURE_EDGE);
    Some(Canvas {
        width: edge(source.width),
        height: edge(source.height),
    })
}

// Filtering premultiplied data directly keeps transparent edges from bleeding colour.
fn downscale_premul(rgba8_premul: &[u8], from: Canvas, to: Canvas) -> EngineResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(from.width, from.height, rgba8_premul.to_vec())
        .ok_or_else(|| SynthesisError::invalid_input("source image byte length mismatch"))?;
    Ok(
        image::imageops::resize(&img, to.width, to.height, image::imageops::FilterType::Triangle)
            .into_raw(),
    )
}

fn pixmap_from_premul_bytes(rgba8_premul: &[u8], canvas: Canvas) -> EngineResult<vello_cpu::Pixmap> {
    let (w, h) = canvas.to_u16()?;
    if rgba8_premul.len() != canvas.rgba8_len() {
        return Err(SynthesisError::invalid_input(
            "source image byte length mismatch",
        ));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(canvas.pixel_count());
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
