//! Render configuration surface.
//!
//! All types here deserialize from the camelCase JSON the batch tool has always used, so a
//! config exported from an earlier session loads unchanged.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{Canvas, Fps, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};

/// Output frame shape. Each variant maps to fixed pixel dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    Feed,
}

impl AspectRatio {
    pub fn canvas(self) -> Canvas {
        let (width, height) = match self {
            Self::Portrait => (1080, 1920),
            Self::Landscape => (1920, 1080),
            Self::Square => (1080, 1080),
            Self::Feed => (1080, 1350),
        };
        Canvas { width, height }
    }
}

/// Requested output container. The actual codec pair is negotiated per session, see
/// [`crate::encode::codec::negotiate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webm,
    Mp4,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleVariant {
    /// Filled rectangle behind each line.
    #[default]
    Box,
    /// Outline stroke around the glyphs.
    Stroke,
}

/// Styling for one text overlay. Overlay `i` renders cell `i` of the current row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayStyle {
    #[serde(default)]
    pub name: String,
    pub enabled: bool,
    pub font_family: String,
    /// Font size as a percentage of the frame width.
    pub font_size: f32,
    pub color: Rgba8,
    pub bg_color: Rgba8,
    pub bg_opacity: f32,
    pub stroke_color: Rgba8,
    #[serde(default = "one")]
    pub stroke_opacity: f32,
    #[serde(rename = "styleType")]
    pub style: StyleVariant,
    /// Vertical center of the text block as a percentage of the frame height.
    pub position_y: f32,
    pub words_per_line: usize,
}

fn one() -> f32 {
    1.0
}

impl OverlayStyle {
    fn preset(name: String, style: StyleVariant, bg_opacity: f32, position_y: f32) -> Self {
        Self {
            name,
            enabled: true,
            font_family: "Arial".to_string(),
            font_size: 5.0,
            color: Rgba8::WHITE,
            bg_color: Rgba8::BLACK,
            bg_opacity,
            stroke_color: Rgba8::BLACK,
            stroke_opacity: 1.0,
            style,
            position_y,
            words_per_line: 4,
        }
    }

    /// One overlay per dataset column: the first column gets a boxed caption, the rest are
    /// stroked, with vertical positions staggered by 20% of the frame height.
    pub fn defaults_for_columns(columns: usize) -> Vec<Self> {
        (0..columns)
            .map(|i| {
                let (style, bg_opacity) = if i == 0 {
                    (StyleVariant::Box, 0.8)
                } else {
                    (StyleVariant::Stroke, 0.0)
                };
                Self::preset(
                    format!("Column {}", i + 1),
                    style,
                    bg_opacity,
                    20.0 + (i as f32) * 20.0,
                )
            })
            .collect()
    }

    pub fn validate(&self) -> ReelResult<()> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(ReelError::validation(format!(
                "overlay '{}' fontSize must be finite and > 0",
                self.name
            )));
        }
        check_unit("bgOpacity", self.bg_opacity, 1.0)?;
        check_unit("strokeOpacity", self.stroke_opacity, 1.0)?;
        if !self.position_y.is_finite() {
            return Err(ReelError::validation("overlay positionY must be finite"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    /// Global alpha of the source clip, `[0, 1]`.
    pub opacity: f32,
    /// Gain of the clip's own audio, `[0, 1]`.
    pub volume: f32,
    pub aspect_ratio: AspectRatio,
    pub format: OutputFormat,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            volume: 1.0,
            aspect_ratio: AspectRatio::default(),
            format: OutputFormat::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    /// Gain of the added audio track, `[0, 1.5]`.
    pub volume: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { volume: 0.5 }
    }
}

/// Everything the job queue needs to render a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// Emit every artifact as a standalone file as soon as its job completes.
    pub auto_download: bool,
    pub video: VideoSettings,
    pub audio: AudioSettings,
    pub overlays: Vec<OverlayStyle>,
    /// Capture rate of the composited canvas.
    pub fps: u32,
    pub video_bitrate: u32,
    /// Font family name -> font file path.
    pub fonts: BTreeMap<String, PathBuf>,
    /// Family used when an overlay names a family missing from `fonts`.
    pub default_font: Option<String>,
    pub archive_name: String,
    pub pause_poll_ms: u64,
    /// Pace decoding at native playback speed instead of as fast as possible.
    pub realtime_playback: bool,
    /// Seed for media selection; `None` draws from OS entropy.
    pub selection_seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let box_caption =
            OverlayStyle::preset("Column 1".to_string(), StyleVariant::Box, 1.0, 10.0);
        let stroke_caption =
            OverlayStyle::preset("Column 2".to_string(), StyleVariant::Stroke, 0.0, 50.0);
        Self {
            auto_download: false,
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
            overlays: vec![box_caption, stroke_caption],
            fps: 30,
            video_bitrate: 5_000_000,
            fonts: BTreeMap::new(),
            default_font: None,
            archive_name: "my_videos".to_string(),
            pause_poll_ms: 500,
            realtime_playback: false,
            selection_seed: None,
        }
    }
}

impl RenderConfig {
    pub fn from_json_str(s: &str) -> ReelResult<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn canvas(&self) -> Canvas {
        self.video.aspect_ratio.canvas()
    }

    pub fn fps(&self) -> ReelResult<Fps> {
        Fps::new(self.fps, 1)
    }

    pub fn pause_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pause_poll_ms.max(1))
    }

    pub fn validate(&self) -> ReelResult<()> {
        check_unit("video.opacity", self.video.opacity, 1.0)?;
        check_unit("video.volume", self.video.volume, 1.0)?;
        check_unit("audio.volume", self.audio.volume, 1.5)?;
        if self.fps == 0 {
            return Err(ReelError::validation("fps must be > 0"));
        }
        if self.video_bitrate == 0 {
            return Err(ReelError::validation("videoBitrate must be > 0"));
        }
        if let Some(name) = &self.default_font
            && !self.fonts.contains_key(name)
        {
            return Err(ReelError::validation(format!(
                "defaultFont '{name}' is not listed in fonts"
            )));
        }
        for overlay in &self.overlays {
            overlay.validate()?;
        }
        Ok(())
    }
}

fn check_unit(field: &str, v: f32, max: f32) -> ReelResult<()> {
    if !v.is_finite() || !(0.0..=max).contains(&v) {
        return Err(ReelError::validation(format!(
            "{field} must be within [0, {max}], got {v}"
        )));
    }
    Ok(())
}
