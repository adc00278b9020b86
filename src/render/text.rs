use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::foundation::error::{ReelError, ReelResult};

/// Split `text` into lines of at most `words_per_line` whitespace-delimited words.
///
/// Words keep their order and are joined by single spaces; only the last line may be short.
/// Empty or all-whitespace text yields no lines. `words_per_line == 0` is treated as 1.
pub fn wrap_text(text: &str, words_per_line: usize) -> Vec<String> {
    let n = words_per_line.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(n).map(|chunk| chunk.join(" ")).collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Font family name -> font file, with an optional fallback family.
#[derive(Clone, Debug, Default)]
pub struct FontBook {
    files: BTreeMap<String, PathBuf>,
    default_family: Option<String>,
}

impl FontBook {
    pub fn new(files: BTreeMap<String, PathBuf>, default_family: Option<String>) -> Self {
        Self {
            files,
            default_family,
        }
    }

    /// Resolve `family` to a font file, falling back to the default family.
    pub fn resolve(&self, family: &str) -> ReelResult<(&str, &PathBuf)> {
        if let Some((name, path)) = self.files.get_key_value(family) {
            return Ok((name.as_str(), path));
        }
        if let Some(fallback) = self.default_family.as_deref()
            && let Some((name, path)) = self.files.get_key_value(fallback)
        {
            tracing::warn!(family, fallback, "font family not registered, using fallback");
            return Ok((name.as_str(), path));
        }
        Err(ReelError::validation(format!(
            "font family '{family}' has no font file; list it under `fonts` or set `defaultFont`"
        )))
    }
}

struct LoadedFont {
    family_name: String,
    data: vello_cpu::peniko::FontData,
}

/// Glyph positions of one shaped line, relative to the line's top-left corner.
pub(crate) struct ShapedLine {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) font_size: f32,
    pub(crate) glyphs: Vec<(u32, f32, f32)>,
}

const SHAPED_CACHE_LIMIT: usize = 256;

/// (font key, size bits, text)
type ShapeKey = (String, u32, String);

/// Parley-backed bold shaping with one registration per font family.
///
/// Shaped lines are memoized, so a caption repeated on every frame of a job is shaped once.
pub struct ParleyText {
    fonts: FontBook,
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    loaded: HashMap<String, LoadedFont>,
    shaped: HashMap<ShapeKey, Arc<ShapedLine>>,
}

impl ParleyText {
    pub fn new(fonts: FontBook) -> Self {
        Self {
            fonts,
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            loaded: HashMap::new(),
            shaped: HashMap::new(),
        }
    }

    /// Resolve and load `family` now instead of at the first frame.
    pub fn preload(&mut self, family: &str) -> ReelResult<()> {
        self.load(family).map(|_| ())
    }

    fn load(&mut self, family: &str) -> ReelResult<String> {
        let (key, path) = self.fonts.resolve(family)?;
        let key = key.to_string();
        if self.loaded.contains_key(&key) {
            return Ok(key);
        }
        let path = path.clone();
        let bytes = std::fs::read(&path).map_err(|e| {
            ReelError::validation(format!("failed to read font '{}': {e}", path.display()))
        })?;
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            ReelError::validation(format!(
                "no font families registered from '{}'",
                path.display()
            ))
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ReelError::validation("registered font family has no name"))?
            .to_string();
        tracing::debug!(family = key.as_str(), registered = family_name.as_str(), "font loaded");

        let data = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);
        self.loaded.insert(key.clone(), LoadedFont { family_name, data });
        Ok(key)
    }

    pub(crate) fn font_data(&mut self, family: &str) -> ReelResult<vello_cpu::peniko::FontData> {
        let key = self.load(family)?;
        self.loaded
            .get(&key)
            .map(|f| f.data.clone())
            .ok_or_else(|| ReelError::render("font cache miss after load"))
    }

    pub(crate) fn shape_line(
        &mut self,
        family: &str,
        size_px: f32,
        text: &str,
    ) -> ReelResult<Arc<ShapedLine>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ReelError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        let key = self.load(family)?;
        let shape_key = (key, size_px.to_bits(), text.to_string());
        if let Some(line) = self.shaped.get(&shape_key) {
            return Ok(Arc::clone(line));
        }
        let family_name = self
            .loaded
            .get(&shape_key.0)
            .map(|f| f.family_name.clone())
            .ok_or_else(|| ReelError::render("font cache miss after load"))?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::BOLD,
        ));
        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);

        let mut glyphs = Vec::new();
        let mut font_size = size_px;
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                font_size = run.run().font_size();
                glyphs.extend(run.positioned_glyphs().map(|g| (u32::from(g.id), g.x, g.y)));
            }
        }

        let line = Arc::new(ShapedLine {
            width: layout.width(),
            height: layout.height(),
            font_size,
            glyphs,
        });
        if self.shaped.len() >= SHAPED_CACHE_LIMIT {
            self.shaped.clear();
        }
        self.shaped.insert(shape_key, Arc::clone(&line));
        Ok(line)
    }

    /// Number of distinct lines currently memoized.
    pub fn shaped_lines(&self) -> usize {
        self.shaped.len()
    }
}
