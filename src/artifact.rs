//! Finished job outputs and where they go.

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};

/// Archive base name used when the requested one sanitises to nothing.
pub const DEFAULT_ARCHIVE_NAME: &str = "processed_videos";

/// One encoded job output. Ownership moves to the [`ArtifactSink`] on completion.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    /// 1-based position in the batch.
    pub sequence: usize,
    pub filename: String,
    pub mime: String,
    pub payload: Vec<u8>,
    pub duration_sec: f64,
}

/// What the session keeps about an artifact after handing it off.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactRecord {
    pub sequence: usize,
    pub filename: String,
    pub size_bytes: usize,
    pub duration_sec: f64,
}

impl Artifact {
    pub fn record(&self) -> ArtifactRecord {
        ArtifactRecord {
            sequence: self.sequence,
            filename: self.filename.clone(),
            size_bytes: self.payload.len(),
            duration_sec: self.duration_sec,
        }
    }
}

/// `"{row+1}.{ext}"` for the 0-based `row_index`.
pub fn artifact_filename(row_index: usize, extension: &str) -> String {
    format!("{}.{extension}", row_index + 1)
}

/// Lowercase, with every character outside `[a-z0-9]` replaced by `_`.
pub fn sanitize_archive_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        DEFAULT_ARCHIVE_NAME.to_string()
    } else {
        safe
    }
}

pub trait ArtifactSink {
    fn put(&mut self, artifact: Artifact) -> ReelResult<()>;
}

/// Collects artifacts for one zip bundle, optionally writing each file as soon as it arrives.
#[derive(Debug, Default)]
pub struct BundleSink {
    artifacts: Vec<Artifact>,
    emit_dir: Option<PathBuf>,
}

impl BundleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write every artifact into `dir` on `put`.
    pub fn with_auto_emit(dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts: Vec::new(),
            emit_dir: Some(dir.into()),
        }
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn clear(&mut self) {
        self.artifacts.clear();
    }

    /// Write every collected artifact into `writer` as a zip, under `folder/` when given.
    pub fn write_zip<W: Write + Seek>(&self, writer: W, folder: Option<&str>) -> ReelResult<W> {
        write_zip_entries(
            writer,
            folder,
            self.artifacts
                .iter()
                .map(|a| (a.filename.as_str(), a.payload.as_slice())),
        )
    }

    /// Write `{dir}/{sanitised name}.zip` and return its path.
    pub fn flush_archive(&self, dir: &Path, name: &str) -> ReelResult<PathBuf> {
        if self.artifacts.is_empty() {
            return Err(ReelError::validation("no artifacts to archive"));
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
        let path = dir.join(format!("{}.zip", sanitize_archive_name(name)));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to create archive '{}'", path.display()))?;
        self.write_zip(file, None)?;
        tracing::info!(
            path = %path.display(),
            entries = self.artifacts.len(),
            "archive written"
        );
        Ok(path)
    }
}

impl ArtifactSink for BundleSink {
    fn put(&mut self, artifact: Artifact) -> ReelResult<()> {
        if let Some(dir) = &self.emit_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
            let path = dir.join(&artifact.filename);
            std::fs::write(&path, &artifact.payload)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            tracing::info!(path = %path.display(), "artifact emitted");
        }
        self.artifacts.push(artifact);
        Ok(())
    }
}

/// Stream `(name, bytes)` entries into a zip. Media payloads are already compressed, so entries
/// are stored as-is.
pub(crate) fn write_zip_entries<'a, W: Write + Seek>(
    writer: W,
    folder: Option<&str>,
    entries: impl IntoIterator<Item = (&'a str, &'a [u8])>,
) -> ReelResult<W> {
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    let mut zip = zip::ZipWriter::new(writer);
    let prefix = match folder {
        Some(folder) => {
            zip.add_directory(folder, options)
                .with_context(|| format!("failed to add zip folder '{folder}'"))?;
            format!("{folder}/")
        }
        None => String::new(),
    };
    for (name, bytes) in entries {
        let entry = format!("{prefix}{name}");
        zip.start_file(entry.as_str(), options)
            .with_context(|| format!("failed to start zip entry '{entry}'"))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write zip entry '{entry}'"))?;
    }
    Ok(zip.finish().context("failed to finalize zip archive")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(sequence: usize, body: &str) -> Artifact {
        Artifact {
            sequence,
            filename: artifact_filename(sequence - 1, "webm"),
            mime: "video/webm".to_string(),
            payload: body.as_bytes().to_vec(),
            duration_sec: 1.0,
        }
    }

    #[test]
    fn filenames_are_one_based() {
        assert_eq!(artifact_filename(0, "mp4"), "1.mp4");
        assert_eq!(artifact_filename(9, "webm"), "10.webm");
    }

    #[test]
    fn archive_names_are_sanitised() {
        assert_eq!(sanitize_archive_name("My Videos!"), "my_videos_");
        assert_eq!(sanitize_archive_name("my_videos"), "my_videos");
        assert_eq!(sanitize_archive_name("Été-2024"), "_t__2024");
        assert_eq!(sanitize_archive_name(""), DEFAULT_ARCHIVE_NAME);
    }

    #[test]
    fn auto_emit_writes_each_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = BundleSink::with_auto_emit(dir.path());
        sink.put(artifact(1, "one")).unwrap();
        sink.put(artifact(2, "two")).unwrap();
        assert_eq!(std::fs::read(dir.path().join("1.webm")).unwrap(), b"one");
        assert_eq!(std::fs::read(dir.path().join("2.webm")).unwrap(), b"two");
        assert_eq!(sink.artifacts().len(), 2);
    }

    #[test]
    fn archive_contains_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = BundleSink::new();
        sink.put(artifact(1, "one")).unwrap();
        sink.put(artifact(2, "two")).unwrap();
        let path = sink.flush_archive(dir.path(), "My Batch").unwrap();
        assert_eq!(path.file_name().unwrap(), "my_batch.zip");

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut body = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("2.webm").unwrap(), &mut body).unwrap();
        assert_eq!(body, "two");
    }

    #[test]
    fn empty_bundle_is_not_archived() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BundleSink::new().flush_archive(dir.path(), "x").is_err());
    }

    #[test]
    fn folder_prefix_is_applied() {
        let cursor = write_zip_entries(
            std::io::Cursor::new(Vec::new()),
            Some("extracted_mp3_audios"),
            [("a.mp3", b"abc".as_slice())],
        )
        .unwrap();
        let archive = zip::ZipArchive::new(cursor).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"extracted_mp3_audios/a.mp3"));
    }
}
