use std::path::{Path, PathBuf};

use rand::Rng;

use crate::foundation::error::{ReelError, ReelResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoAsset {
    /// Display name, usually the file name.
    pub name: String,
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioAsset {
    pub name: String,
    pub path: PathBuf,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl VideoAsset {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
        }
    }

    /// File name without its extension, used to name extracted audio.
    pub fn stem(&self) -> String {
        match self.name.split('.').next() {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => self.name.clone(),
        }
    }
}

impl AudioAsset {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
        }
    }
}

/// Source clips for a batch: at least one video, any number of added-audio tracks.
///
/// Selection is uniform with replacement; nothing guarantees that every asset is used.
#[derive(Clone, Debug)]
pub struct MediaPool {
    videos: Vec<VideoAsset>,
    audio: Vec<AudioAsset>,
}

impl MediaPool {
    pub fn new(videos: Vec<VideoAsset>, audio: Vec<AudioAsset>) -> ReelResult<Self> {
        if videos.is_empty() {
            return Err(ReelError::validation("media pool needs at least one video"));
        }
        Ok(Self { videos, audio })
    }

    pub fn videos(&self) -> &[VideoAsset] {
        &self.videos
    }

    pub fn audio(&self) -> &[AudioAsset] {
        &self.audio
    }

    pub fn pick_video<R: Rng + ?Sized>(&self, rng: &mut R) -> &VideoAsset {
        &self.videos[rng.gen_range(0..self.videos.len())]
    }

    /// `None` when the audio pool is empty.
    pub fn pick_audio<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&AudioAsset> {
        if self.audio.is_empty() {
            return None;
        }
        Some(&self.audio[rng.gen_range(0..self.audio.len())])
    }
}
