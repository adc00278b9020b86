use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::artifact::write_zip_entries;
use crate::encode::sink::AudioTranscoder;
use crate::foundation::error::{ReelError, ReelResult};
use crate::media::pool::VideoAsset;
use crate::media::source::MediaBackend;
use crate::session::progress::percentage;
use crate::session::state::{SessionHandle, SessionOutcome};

pub const AUDIO_ARCHIVE_NAME: &str = "audios.zip";
pub const AUDIO_ARCHIVE_FOLDER: &str = "extracted_mp3_audios";

/// MP3 bitrate tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Quality {
    #[default]
    Standard,
    High,
}

impl Quality {
    pub fn bitrate_bps(self) -> u32 {
        match self {
            Self::Standard => 128_000,
            Self::High => 320_000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExtractedAudio {
    pub filename: String,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct Extraction {
    pub outcome: SessionOutcome,
    pub files: Vec<ExtractedAudio>,
    /// Names of videos without an audio stream.
    pub skipped: Vec<String>,
}

impl Extraction {
    pub fn write_zip<W: Write + Seek>(&self, writer: W) -> ReelResult<W> {
        write_zip_entries(
            writer,
            Some(AUDIO_ARCHIVE_FOLDER),
            self.files
                .iter()
                .map(|f| (f.filename.as_str(), f.payload.as_slice())),
        )
    }

    /// Write `{dir}/audios.zip` and return its path.
    pub fn write_archive(&self, dir: &Path) -> ReelResult<PathBuf> {
        if self.files.is_empty() {
            return Err(ReelError::validation("no extracted audio to archive"));
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
        let path = dir.join(AUDIO_ARCHIVE_NAME);
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to create archive '{}'", path.display()))?;
        self.write_zip(file)?;
        tracing::info!(path = %path.display(), entries = self.files.len(), "audio archive written");
        Ok(path)
    }
}

/// `{stem}.mp3`, or `{stem} (n).mp3` with the smallest `n >= 2` not already taken.
fn unique_mp3_name(stem: &str, taken: &[ExtractedAudio]) -> String {
    let is_free = |name: &str| taken.iter().all(|f| f.filename != name);
    let first = format!("{stem}.mp3");
    if is_free(&first) {
        return first;
    }
    (2..)
        .map(|n| format!("{stem} ({n}).mp3"))
        .find(|name| is_free(name))
        .unwrap_or(first)
}

/// Re-encode the embedded audio of every video, in pool order, with no compositing or mixing.
pub struct AudioExtractionPipeline {
    media: Box<dyn MediaBackend>,
    transcoder: Box<dyn AudioTranscoder>,
    quality: Quality,
    handle: SessionHandle,
}

impl AudioExtractionPipeline {
    pub fn new(
        media: Box<dyn MediaBackend>,
        transcoder: Box<dyn AudioTranscoder>,
        quality: Quality,
    ) -> Self {
        Self {
            media,
            transcoder,
            quality,
            handle: SessionHandle::new(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Extract every video's audio. A failure ends the run with [`SessionOutcome::Failed`] and
    /// keeps whatever was extracted before it.
    pub fn run(&mut self, videos: &[VideoAsset]) -> ReelResult<Extraction> {
        self.handle.begin(videos.len())?;
        let mut files = Vec::new();
        let mut skipped = Vec::new();

        let result = self.extract_all(videos, &mut files, &mut skipped);
        let (outcome, status) = match result {
            Ok(()) if self.handle.stop_requested() => {
                (SessionOutcome::Stopped, SessionOutcome::Stopped.status_text())
            }
            Ok(()) => (SessionOutcome::Completed, "Done!".to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "audio extraction aborted");
                let outcome = SessionOutcome::Failed(e.to_string());
                let status = outcome.status_text();
                (outcome, status)
            }
        };
        self.handle.end_with(&outcome, status);
        Ok(Extraction {
            outcome,
            files,
            skipped,
        })
    }

    fn extract_all(
        &mut self,
        videos: &[VideoAsset],
        files: &mut Vec<ExtractedAudio>,
        skipped: &mut Vec<String>,
    ) -> ReelResult<()> {
        let total = videos.len();
        for (i, video) in videos.iter().enumerate() {
            if self.handle.stop_requested() {
                break;
            }
            self.handle
                .set_status_text(format!("Extracting Audio {}/{}", i + 1, total));

            let info = self.media.probe_video(video)?;
            if info.has_audio {
                let payload = self
                    .transcoder
                    .transcode_audio(&video.path, self.quality.bitrate_bps())?;
                tracing::info!(video = %video.name, bytes = payload.len(), "audio extracted");
                let filename = unique_mp3_name(&video.stem(), files);
                files.push(ExtractedAudio { filename, payload });
            } else {
                tracing::warn!(video = %video.name, "video has no audio stream, skipping");
                skipped.push(video.name.clone());
            }
            self.handle.set_counts(i + 1, percentage(i + 1, total));
        }
        Ok(())
    }
}
