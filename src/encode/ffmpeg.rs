use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::encode::codec::{AvailableEncoders, Container};
use crate::encode::sink::{AudioTranscoder, EncoderConfig, EncoderFactory, JobEncoder};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::mul_div255_u16;
use crate::media::ffmpeg::tool_command;
use crate::render::FrameRGBA;

/// [`EncoderFactory`] backed by the system `ffmpeg`.
#[derive(Debug, Default)]
pub struct FfmpegEncoders {
    probed: Option<AvailableEncoders>,
}

impl FfmpegEncoders {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EncoderFactory for FfmpegEncoders {
    fn available(&mut self) -> ReelResult<AvailableEncoders> {
        if let Some(found) = &self.probed {
            return Ok(found.clone());
        }
        let found = AvailableEncoders::probe_ffmpeg()?;
        self.probed = Some(found.clone());
        Ok(found)
    }

    fn create(&mut self) -> ReelResult<Box<dyn JobEncoder>> {
        Ok(Box::new(FfmpegJobEncoder::new()))
    }
}

struct TempFileGuard(Option<PathBuf>);

impl TempFileGuard {
    fn new(ext: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self(Some(std::env::temp_dir().join(format!(
            "reelsmith_{}_{nanos}_{n}.{ext}",
            std::process::id()
        ))))
    }

    fn path(&self) -> ReelResult<&Path> {
        self.0
            .as_deref()
            .ok_or_else(|| ReelError::render("temporary file already released"))
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

struct ActiveJob {
    cfg: EncoderConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    video_tmp: TempFileGuard,
    audio_tmp: TempFileGuard,
    audio_out: BufWriter<File>,
    last_idx: Option<FrameIndex>,
}

/// Streams flattened RGBA frames into ffmpeg and buffers the mixed audio as raw `f32le`; the
/// two are muxed into the negotiated container on `finish`.
#[derive(Default)]
pub struct FfmpegJobEncoder {
    active: Option<ActiveJob>,
    scratch: Vec<u8>,
}

impl FfmpegJobEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&mut self) -> ReelResult<&mut ActiveJob> {
        self.active
            .as_mut()
            .ok_or_else(|| ReelError::render("ffmpeg encoder not started"))
    }
}

fn spawn_failed(e: std::io::Error) -> ReelError {
    ReelError::encoder_unsupported(format!(
        "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
    ))
}

impl JobEncoder for FfmpegJobEncoder {
    fn begin(&mut self, cfg: EncoderConfig) -> ReelResult<()> {
        cfg.validate()?;
        self.abort();

        let video_tmp = TempFileGuard::new(cfg.profile.extension());
        let audio_tmp = TempFileGuard::new("f32le");

        let mut cmd = tool_command("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        // Input: raw premultiplied RGBA8, flattened before it is written (push_frame).
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            cfg.profile.video_encoder,
            "-b:v",
            &cfg.video_bitrate.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-f",
            cfg.profile.muxer(),
        ])
        .arg(video_tmp.path()?);

        let mut child = cmd.spawn().map_err(spawn_failed)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::render("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::render("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let audio_out = File::create(audio_tmp.path()?).map_err(|e| {
            ReelError::render(format!("failed to create audio scratch file: {e}"))
        })?;

        self.scratch = vec![0u8; cfg.width as usize * cfg.height as usize * 4];
        tracing::debug!(
            width = cfg.width,
            height = cfg.height,
            encoder = cfg.profile.video_encoder,
            "ffmpeg encoder started"
        );
        self.active = Some(ActiveJob {
            cfg,
            child,
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            video_tmp,
            audio_tmp,
            audio_out: BufWriter::new(audio_out),
            last_idx: None,
        });
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        let Self { active, scratch } = self;
        let job = active
            .as_mut()
            .ok_or_else(|| ReelError::render("ffmpeg encoder not started"))?;
        if let Some(last) = job.last_idx
            && idx.0 <= last.0
        {
            return Err(ReelError::render(
                "ffmpeg encoder received out-of-order frame index",
            ));
        }
        job.last_idx = Some(idx);
        if frame.width != job.cfg.width || frame.height != job.cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, job.cfg.width, job.cfg.height
            )));
        }

        flatten_to_opaque_rgba8(scratch, &frame.data, frame.premultiplied, [0, 0, 0, 255])?;

        let stdin = job
            .stdin
            .as_mut()
            .ok_or_else(|| ReelError::render("ffmpeg encoder is already finalized"))?;
        stdin.write_all(scratch).map_err(|e| {
            ReelError::render(format!("failed to write frame to ffmpeg stdin: {e}"))
        })
    }

    fn push_audio(&mut self, samples: &[f32]) -> ReelResult<()> {
        let job = self.active()?;
        for s in samples {
            job.audio_out
                .write_all(&s.to_le_bytes())
                .map_err(|e| ReelError::render(format!("failed to buffer audio: {e}")))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> ReelResult<Vec<u8>> {
        let mut job = self
            .active
            .take()
            .ok_or_else(|| ReelError::render("ffmpeg encoder not started"))?;

        drop(job.stdin.take());
        let status = job.child.wait().map_err(|e| {
            ReelError::render(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match job.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReelError::render("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReelError::render(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            return Err(ReelError::render(format!(
                "ffmpeg exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        job.audio_out
            .flush()
            .map_err(|e| ReelError::render(format!("failed to flush audio: {e}")))?;

        mux(&job)
    }

    fn abort(&mut self) {
        if let Some(mut job) = self.active.take() {
            drop(job.stdin.take());
            let _ = job.child.kill();
            let _ = job.child.wait();
            if let Some(handle) = job.stderr_drain.take() {
                let _ = handle.join();
            }
            tracing::debug!("ffmpeg encoder aborted");
        }
    }
}

impl Drop for FfmpegJobEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}

fn mux(job: &ActiveJob) -> ReelResult<Vec<u8>> {
    let profile = job.cfg.profile;
    let out_tmp = TempFileGuard::new(profile.extension());
    let mut cmd = tool_command("ffmpeg");
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(job.video_tmp.path()?)
        .args([
            "-f",
            "f32le",
            "-ar",
            &job.cfg.audio.sample_rate.to_string(),
            "-ac",
            &job.cfg.audio.channels.to_string(),
            "-i",
        ])
        .arg(job.audio_tmp.path()?)
        .args(["-c:v", "copy", "-c:a", profile.audio_encoder, "-shortest"]);
    if profile.container == Container::Mp4 {
        cmd.args(["-movflags", "+faststart"]);
    }
    cmd.args(["-f", profile.muxer()]).arg(out_tmp.path()?);

    let out = cmd.output().map_err(spawn_failed)?;
    if !out.status.success() {
        return Err(ReelError::render(format!(
            "ffmpeg mux exited with status {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    std::fs::read(out_tmp.path()?)
        .map_err(|e| ReelError::render(format!("failed to read muxed output: {e}")))
}

/// Audio-only re-encode to MP3 through `libmp3lame`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegMp3Transcoder;

impl AudioTranscoder for FfmpegMp3Transcoder {
    fn transcode_audio(&mut self, source: &Path, bitrate_bps: u32) -> ReelResult<Vec<u8>> {
        let out = tool_command("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(source)
            .args([
                "-vn",
                "-c:a",
                "libmp3lame",
                "-b:a",
                &bitrate_bps.to_string(),
                "-f",
                "mp3",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(spawn_failed)?;
        if !out.status.success() {
            return Err(ReelError::asset_unavailable(format!(
                "audio extraction failed for '{}': {}",
                source.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(out.stdout)
    }
}

fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "frame.data size mismatch with width*height*4",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255u16 - a;
        let own = |c: u8| {
            if src_is_premul {
                c as u16
            } else {
                mul_div255_u16(c as u16, a)
            }
        };
        d[0] = (own(s[0]) + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[1] = (own(s[1]) + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[2] = (own(s[2]) + mul_div255_u16(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }
    Ok(())
}
