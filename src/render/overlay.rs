use crate::config::{OverlayStyle, StyleVariant};
use crate::foundation::core::{Canvas, Rect};
use crate::foundation::error::ReelResult;
use crate::render::text::wrap_text;

const LINE_HEIGHT_FACTOR: f64 = 1.4;
const BOX_PADDING_FACTOR: f64 = 0.4;
const STROKE_WIDTH_FACTOR: f64 = 0.15;

/// Horizontal advance of a single line of text.
pub trait TextMeasure {
    fn line_width(&mut self, family: &str, size_px: f32, text: &str) -> ReelResult<f32>;
}

/// One laid-out line; `center_x`/`center_y` is the anchor the text is centered on.
#[derive(Clone, Debug, PartialEq)]
pub struct LineGeometry {
    pub text: String,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    /// Box backdrop, present for [`StyleVariant::Box`] only.
    pub backdrop: Option<Rect>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayLayout {
    pub font_px: f32,
    pub line_height: f64,
    /// Outline width, present for [`StyleVariant::Stroke`] only.
    pub stroke_width: Option<f64>,
    pub lines: Vec<LineGeometry>,
}

impl OverlayLayout {
    pub fn line_texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }
}

/// Lay out one overlay for the current cell.
///
/// Returns `Ok(None)` when the overlay is disabled, the text has no words, or the font size
/// rounds down to zero pixels. The block is centered vertically on `position_y` percent of the
/// frame height and every line is centered horizontally on its own width. Lines wider than the
/// frame are left unclamped.
pub fn layout_overlay<M: TextMeasure + ?Sized>(
    style: &OverlayStyle,
    text: &str,
    canvas: Canvas,
    measure: &mut M,
) -> ReelResult<Option<OverlayLayout>> {
    if !style.enabled {
        return Ok(None);
    }
    let wrapped = wrap_text(text, style.words_per_line);
    if wrapped.is_empty() {
        return Ok(None);
    }
    let (w, h) = (f64::from(canvas.width), f64::from(canvas.height));
    let font_px = (w * f64::from(style.font_size) / 100.0).floor();
    if font_px <= 0.0 {
        return Ok(None);
    }

    let line_height = font_px * LINE_HEIGHT_FACTOR;
    let padding = font_px * BOX_PADDING_FACTOR;
    let block_height = wrapped.len() as f64 * line_height;
    let start_y =
        h * (f64::from(style.position_y) / 100.0) - block_height / 2.0 + line_height / 2.0;
    let center_x = w / 2.0;

    let mut lines = Vec::with_capacity(wrapped.len());
    for (idx, text) in wrapped.into_iter().enumerate() {
        let center_y = start_y + idx as f64 * line_height;
        let width = f64::from(measure.line_width(&style.font_family, font_px as f32, &text)?);
        let backdrop = match style.style {
            StyleVariant::Box => Some(Rect::from_origin_size(
                (
                    center_x - width / 2.0 - padding,
                    center_y - font_px / 2.0 - padding / 2.0,
                ),
                (width + padding * 2.0, font_px + padding),
            )),
            StyleVariant::Stroke => None,
        };
        lines.push(LineGeometry {
            text,
            center_x,
            center_y,
            width,
            backdrop,
        });
    }

    Ok(Some(OverlayLayout {
        font_px: font_px as f32,
        line_height,
        stroke_width: match style.style {
            StyleVariant::Stroke => Some(font_px * STROKE_WIDTH_FACTOR),
            StyleVariant::Box => None,
        },
        lines,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character advances half the font size.
    struct HalfEm;

    impl TextMeasure for HalfEm {
        fn line_width(&mut self, _family: &str, size_px: f32, text: &str) -> ReelResult<f32> {
            Ok(text.chars().count() as f32 * size_px * 0.5)
        }
    }

    fn portrait() -> Canvas {
        Canvas {
            width: 1080,
            height: 1920,
        }
    }

    fn style(variant: StyleVariant, words_per_line: usize) -> OverlayStyle {
        let mut s = OverlayStyle::defaults_for_columns(1).remove(0);
        s.style = variant;
        s.words_per_line = words_per_line;
        s.position_y = 50.0;
        s
    }

    #[test]
    fn box_geometry_follows_font_size() {
        let layout =
            layout_overlay(&style(StyleVariant::Box, 2), "Hello World", portrait(), &mut HalfEm)
                .unwrap()
                .unwrap();
        assert_eq!(layout.font_px, 54.0);
        assert!((layout.line_height - 75.6).abs() < 1e-9);
        assert_eq!(layout.stroke_width, None);
        assert_eq!(layout.line_texts(), vec!["Hello World"]);

        let line = &layout.lines[0];
        assert!((line.center_y - 960.0).abs() < 1e-9);
        assert_eq!(line.width, 11.0 * 27.0);
        let pad = 54.0 * 0.4;
        let b = line.backdrop.unwrap();
        assert!((b.x0 - (540.0 - line.width / 2.0 - pad)).abs() < 1e-9);
        assert!((b.width() - (line.width + 2.0 * pad)).abs() < 1e-9);
        assert!((b.y0 - (960.0 - 27.0 - pad / 2.0)).abs() < 1e-9);
        assert!((b.height() - (54.0 + pad)).abs() < 1e-9);
    }

    #[test]
    fn block_is_centered_on_position() {
        let layout = layout_overlay(
            &style(StyleVariant::Stroke, 2),
            "Foo Bar Baz Qux",
            portrait(),
            &mut HalfEm,
        )
        .unwrap()
        .unwrap();
        assert_eq!(layout.line_texts(), vec!["Foo Bar", "Baz Qux"]);
        let ys: Vec<f64> = layout.lines.iter().map(|l| l.center_y).collect();
        let mid = (ys[0] + ys[1]) / 2.0;
        assert!((mid - 960.0).abs() < 1e-9);
        assert!((ys[1] - ys[0] - layout.line_height).abs() < 1e-9);
        assert!((layout.stroke_width.unwrap() - 54.0 * 0.15).abs() < 1e-9);
        assert!(layout.lines.iter().all(|l| l.backdrop.is_none()));
    }

    #[test]
    fn lines_are_centered_independently() {
        let layout =
            layout_overlay(&style(StyleVariant::Box, 2), "a bbbbbbb c", portrait(), &mut HalfEm)
                .unwrap()
                .unwrap();
        for line in &layout.lines {
            let b = line.backdrop.unwrap();
            assert!(((b.x0 + b.x1) / 2.0 - 540.0).abs() < 1e-9);
        }
        assert_ne!(layout.lines[0].width, layout.lines[1].width);
    }

    #[test]
    fn disabled_or_empty_overlays_are_skipped() {
        let mut s = style(StyleVariant::Box, 3);
        assert!(layout_overlay(&s, "", portrait(), &mut HalfEm).unwrap().is_none());
        assert!(layout_overlay(&s, "  ", portrait(), &mut HalfEm).unwrap().is_none());
        s.enabled = false;
        assert!(layout_overlay(&s, "text", portrait(), &mut HalfEm).unwrap().is_none());
    }

    #[test]
    fn oversize_lines_are_not_clamped() {
        let mut s = style(StyleVariant::Box, 50);
        s.font_size = 20.0;
        let layout = layout_overlay(&s, &"w ".repeat(40), portrait(), &mut HalfEm)
            .unwrap()
            .unwrap();
        let b = layout.lines[0].backdrop.unwrap();
        assert!(b.x0 < 0.0 && b.x1 > 1080.0);
    }
}
