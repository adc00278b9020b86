use std::collections::BTreeSet;
use std::process::Stdio;

use crate::config::OutputFormat;
use crate::foundation::error::{ReelError, ReelResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Webm,
}

/// One concrete container + codec pair, named by ffmpeg encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecProfile {
    pub container: Container,
    pub video_encoder: &'static str,
    pub audio_encoder: &'static str,
    pub mime: &'static str,
}

impl CodecProfile {
    pub const MP4_H264_AAC: Self = Self {
        container: Container::Mp4,
        video_encoder: "libx264",
        audio_encoder: "aac",
        mime: "video/mp4;codecs=avc1.42E01E,mp4a.40.2",
    };
    pub const MP4_MPEG4_AAC: Self = Self {
        container: Container::Mp4,
        video_encoder: "mpeg4",
        audio_encoder: "aac",
        mime: "video/mp4",
    };
    pub const WEBM_VP8_OPUS: Self = Self {
        container: Container::Webm,
        video_encoder: "libvpx",
        audio_encoder: "libopus",
        mime: "video/webm;codecs=vp8,opus",
    };

    pub fn extension(&self) -> &'static str {
        match self.container {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
        }
    }

    /// ffmpeg muxer name (`-f`).
    pub fn muxer(&self) -> &'static str {
        match self.container {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
        }
    }

    /// Mime type without codec parameters.
    pub fn base_mime(&self) -> &'static str {
        self.mime.split(';').next().unwrap_or(self.mime)
    }
}

/// Preference order for a requested format, best first.
pub fn candidates(format: OutputFormat) -> &'static [CodecProfile] {
    match format {
        OutputFormat::Mp4 => &[
            CodecProfile::MP4_H264_AAC,
            CodecProfile::MP4_MPEG4_AAC,
            CodecProfile::WEBM_VP8_OPUS,
        ],
        OutputFormat::Webm => &[CodecProfile::WEBM_VP8_OPUS],
    }
}

/// Encoder names the runtime can use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvailableEncoders {
    names: BTreeSet<String>,
}

impl AvailableEncoders {
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the table printed by `ffmpeg -encoders`.
    ///
    /// Rows look like ` V....D libx264  H.264 / AVC ...`; header lines are skipped by requiring
    /// a six-character capability column.
    pub fn parse_ffmpeg_listing(listing: &str) -> Self {
        let mut names = BTreeSet::new();
        for line in listing.lines() {
            let mut cols = line.split_whitespace();
            let (Some(flags), Some(name)) = (cols.next(), cols.next()) else {
                continue;
            };
            let is_row = flags.len() == 6
                && flags.starts_with(['V', 'A', 'S'])
                && flags.chars().skip(1).all(|c| c == '.' || c.is_ascii_uppercase());
            if is_row && name != "=" {
                names.insert(name.to_string());
            }
        }
        Self { names }
    }

    /// Run `ffmpeg -hide_banner -encoders` once and collect the encoder names.
    pub fn probe_ffmpeg() -> ReelResult<Self> {
        let out = crate::media::ffmpeg::tool_command("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| {
                ReelError::encoder_unsupported(format!(
                    "failed to run ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;
        if !out.status.success() {
            return Err(ReelError::encoder_unsupported(format!(
                "ffmpeg -encoders exited with status {}",
                out.status
            )));
        }
        let found = Self::parse_ffmpeg_listing(&String::from_utf8_lossy(&out.stdout));
        tracing::debug!(count = found.names.len(), "probed ffmpeg encoders");
        Ok(found)
    }

    pub fn has(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn supports(&self, profile: &CodecProfile) -> bool {
        self.has(profile.video_encoder) && self.has(profile.audio_encoder)
    }
}

/// Pick the first supported profile for `format`.
///
/// Falling back to a different container is logged but not an error; only an exhausted list is.
pub fn negotiate(format: OutputFormat, available: &AvailableEncoders) -> ReelResult<CodecProfile> {
    let list = candidates(format);
    for (rank, profile) in list.iter().enumerate() {
        if available.supports(profile) {
            if rank > 0 {
                tracing::warn!(
                    ?format,
                    chosen = profile.mime,
                    "preferred codec unavailable, falling back"
                );
            } else {
                tracing::debug!(?format, chosen = profile.mime, "codec negotiated");
            }
            return Ok(*profile);
        }
    }
    Err(ReelError::encoder_unsupported(format!(
        "no usable encoder pair for {format:?} (tried {})",
        list.iter()
            .map(|p| format!("{}+{}", p.video_encoder, p.audio_encoder))
            .collect::<Vec<_>>()
            .join(", ")
    )))
}
