use std::sync::Arc;

use vello_cpu::kurbo::{Affine, Stroke};
use vello_cpu::peniko::Color;

use crate::config::{OverlayStyle, RenderConfig, StyleVariant};
use crate::dataset::Row;
use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::mul_div255_u16;
use crate::media::source::SourceFrame;
use crate::render::cover::cover_fit_center;
use crate::render::overlay::{OverlayLayout, TextMeasure, layout_overlay};
use crate::render::text::{FontBook, ParleyText};
use crate::render::{FrameCompositor, FrameRGBA};

/// How a line of glyphs is painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GlyphPaint {
    Fill,
    Stroke { width: f64 },
}

/// One line of text to paint, centered on `center`.
#[derive(Clone, Copy, Debug)]
pub struct LineRequest<'a> {
    pub family: &'a str,
    pub size_px: f32,
    pub text: &'a str,
    pub center: (f64, f64),
    pub color: Rgba8,
}

/// Text shaping plus glyph drawing into a vello_cpu context.
pub trait GlyphPainter: TextMeasure + Send {
    fn paint_line(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        line: &LineRequest<'_>,
        paint: GlyphPaint,
    ) -> ReelResult<()>;
}

impl TextMeasure for ParleyText {
    fn line_width(&mut self, family: &str, size_px: f32, text: &str) -> ReelResult<f32> {
        Ok(self.shape_line(family, size_px, text)?.width)
    }
}

impl GlyphPainter for ParleyText {
    fn paint_line(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        line: &LineRequest<'_>,
        paint: GlyphPaint,
    ) -> ReelResult<()> {
        let shaped = self.shape_line(line.family, line.size_px, line.text)?;
        let font = self.font_data(line.family)?;
        let origin_x = line.center.0 - f64::from(shaped.width) / 2.0;
        let origin_y = line.center.1 - f64::from(shaped.height) / 2.0;

        ctx.set_transform(Affine::translate((origin_x, origin_y)));
        ctx.set_paint(color_to_cpu(line.color));
        let glyphs = shaped
            .glyphs
            .iter()
            .map(|&(id, x, y)| vello_cpu::Glyph { id, x, y });
        match paint {
            GlyphPaint::Fill => {
                ctx.glyph_run(&font)
                    .font_size(shaped.font_size)
                    .fill_glyphs(glyphs);
            }
            GlyphPaint::Stroke { width } => {
                ctx.set_stroke(Stroke::new(width));
                ctx.glyph_run(&font)
                    .font_size(shaped.font_size)
                    .stroke_glyphs(glyphs);
            }
        }
        Ok(())
    }
}

/// CPU frame compositor: black background, cover-fit source, then overlays.
///
/// Overlay layouts are cached per row. Glyph shaping is memoized by the painter.
pub struct CpuCompositor<P: GlyphPainter = ParleyText> {
    canvas: Canvas,
    width: u16,
    height: u16,
    overlays: Vec<OverlayStyle>,
    opacity: f32,
    painter: P,
    pixmap: vello_cpu::Pixmap,
    frame: FrameRGBA,
    layout_cache: Option<(Row, Vec<(usize, OverlayLayout)>)>,
}

impl CpuCompositor<ParleyText> {
    /// Build from a config, loading the font of every enabled overlay up front.
    pub fn from_config(cfg: &RenderConfig) -> ReelResult<Self> {
        let fonts = FontBook::new(cfg.fonts.clone(), cfg.default_font.clone());
        let mut text = ParleyText::new(fonts);
        for overlay in cfg.overlays.iter().filter(|o| o.enabled) {
            text.preload(&overlay.font_family)?;
        }
        Self::new(cfg.canvas(), cfg.overlays.clone(), cfg.video.opacity, text)
    }
}

impl<P: GlyphPainter> CpuCompositor<P> {
    pub fn new(
        canvas: Canvas,
        overlays: Vec<OverlayStyle>,
        opacity: f32,
        painter: P,
    ) -> ReelResult<Self> {
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| ReelError::validation("canvas width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| ReelError::validation("canvas height exceeds u16"))?;
        if width == 0 || height == 0 {
            return Err(ReelError::validation("canvas width/height must be > 0"));
        }
        Ok(Self {
            canvas,
            width,
            height,
            overlays,
            opacity: opacity.clamp(0.0, 1.0),
            painter,
            pixmap: vello_cpu::Pixmap::new(width, height),
            frame: FrameRGBA {
                width: canvas.width,
                height: canvas.height,
                data: vec![0u8; canvas.width as usize * canvas.height as usize * 4],
                premultiplied: true,
            },
            layout_cache: None,
        })
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    /// Overlay layouts of the most recently composed row, keyed by overlay index.
    pub fn current_layouts(&self) -> &[(usize, OverlayLayout)] {
        self.layout_cache
            .as_ref()
            .map(|(_, layouts)| layouts.as_slice())
            .unwrap_or(&[])
    }

    fn layouts_for(&mut self, row: &Row) -> ReelResult<()> {
        if let Some((cached, _)) = &self.layout_cache
            && cached == row
        {
            return Ok(());
        }
        let mut layouts = Vec::new();
        for (i, style) in self.overlays.iter().enumerate() {
            let Some(text) = row.cell(i) else {
                continue;
            };
            if let Some(layout) = layout_overlay(style, text, self.canvas, &mut self.painter)? {
                layouts.push((i, layout));
            }
        }
        self.layout_cache = Some((row.clone(), layouts));
        Ok(())
    }

    fn draw_source(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        source: &SourceFrame,
    ) -> ReelResult<()> {
        let Some(crop) =
            cover_fit_center(source.width, source.height, self.canvas.width, self.canvas.height)
        else {
            return Ok(());
        };
        let pixmap = straight_rgba_to_pixmap(&source.rgba, source.width, source.height)?;
        let image = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };

        let sx = f64::from(self.canvas.width) / crop.w;
        let sy = f64::from(self.canvas.height) / crop.h;
        ctx.set_transform(
            Affine::scale_non_uniform(sx, sy) * Affine::translate((-crop.x, -crop.y)),
        );
        ctx.set_paint(image);
        if self.opacity < 1.0 {
            ctx.push_opacity_layer(self.opacity);
        }
        ctx.fill_rect(&rect_to_cpu(crop.to_rect()));
        if self.opacity < 1.0 {
            ctx.pop_layer();
        }
        Ok(())
    }

    fn draw_overlays(&mut self, ctx: &mut vello_cpu::RenderContext) -> ReelResult<()> {
        let Some((_, layouts)) = &self.layout_cache else {
            return Ok(());
        };
        for (i, layout) in layouts {
            let style = &self.overlays[*i];
            for line in &layout.lines {
                let request = LineRequest {
                    family: &style.font_family,
                    size_px: layout.font_px,
                    text: &line.text,
                    center: (line.center_x, line.center_y),
                    color: style.color,
                };
                match style.style {
                    StyleVariant::Box => {
                        if let Some(rect) = line.backdrop {
                            ctx.set_transform(Affine::IDENTITY);
                            let bg = style.bg_color.with_opacity(style.bg_opacity);
                            ctx.set_paint(color_to_cpu(bg));
                            ctx.fill_rect(&rect_to_cpu(rect));
                        }
                    }
                    StyleVariant::Stroke => {
                        if let Some(width) = layout.stroke_width {
                            let stroke = LineRequest {
                                color: style.stroke_color,
                                ..request
                            };
                            let layered = style.stroke_opacity < 1.0;
                            if layered {
                                ctx.push_opacity_layer(style.stroke_opacity.max(0.0));
                            }
                            self.painter
                                .paint_line(ctx, &stroke, GlyphPaint::Stroke { width })?;
                            if layered {
                                ctx.pop_layer();
                            }
                        }
                    }
                }
                self.painter.paint_line(ctx, &request, GlyphPaint::Fill)?;
            }
        }
        Ok(())
    }
}

impl<P: GlyphPainter> FrameCompositor for CpuCompositor<P> {
    fn canvas(&self) -> Canvas {
        self.canvas
    }

    fn compose(&mut self, source: Option<&SourceFrame>, row: &Row) -> ReelResult<()> {
        self.layouts_for(row)?;

        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        ctx.set_paint_transform(Affine::IDENTITY);
        ctx.set_transform(Affine::IDENTITY);
        ctx.set_paint(Color::from_rgba8(0, 0, 0, 255));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.width),
            f64::from(self.height),
        ));

        if let Some(source) = source {
            self.draw_source(&mut ctx, source)?;
        }
        self.draw_overlays(&mut ctx)?;

        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);
        self.frame
            .data
            .copy_from_slice(self.pixmap.data_as_u8_slice());
        Ok(())
    }

    fn frame(&self) -> &FrameRGBA {
        &self.frame
    }
}

fn rect_to_cpu(r: kurbo::Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn color_to_cpu(c: Rgba8) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn straight_rgba_to_pixmap(rgba: &[u8], width: u32, height: u32) -> ReelResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ReelError::render("source frame width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ReelError::render("source frame height exceeds u16"))?;
    if rgba.len() != width as usize * height as usize * 4 {
        return Err(ReelError::render("source frame byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        let premul = |c: u8| mul_div255_u16(u16::from(c), u16::from(a)) as u8;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: premul(px[0]),
            g: premul(px[1]),
            b: premul(px[2]),
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
