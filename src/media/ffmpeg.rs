use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::audio::mix::{MIX_CHANNELS, MIX_SAMPLE_RATE};
use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};
use crate::media::pool::{AudioAsset, VideoAsset};
use crate::media::source::{
    AudioInfo, AudioPlayback, FrameEvent, MediaBackend, SourceFrame, VideoInfo, VideoPlayback,
};

/// `tool` in its own process group, so a terminal interrupt reaches only this process.
pub(crate) fn tool_command(tool: &str) -> Command {
    let mut cmd = Command::new(tool);
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
    cmd
}

/// [`MediaBackend`] that shells out to the system `ffprobe`/`ffmpeg`.
#[derive(Clone, Debug, Default)]
pub struct FfmpegMedia {
    /// Pass `-re` so decoding advances at native playback speed.
    pub realtime: bool,
}

impl FfmpegMedia {
    pub fn new(realtime: bool) -> Self {
        Self { realtime }
    }
}

#[derive(serde::Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(serde::Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    tags: Option<ProbeTags>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

fn run_ffprobe(path: &Path) -> ReelResult<ProbeOut> {
    let out = tool_command("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| ReelError::asset_unavailable(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ReelError::asset_unavailable(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    serde_json::from_slice(&out.stdout)
        .map_err(|e| ReelError::asset_unavailable(format!("ffprobe json parse failed: {e}")))
}

fn probe_duration(parsed: &ProbeOut) -> f64 {
    parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

impl ProbeStream {
    /// Display rotation in degrees within `[0, 360)`: the display matrix first, then the
    /// legacy `rotate` tag.
    fn rotation_degrees(&self) -> i64 {
        let from_matrix = self.side_data_list.iter().find_map(|d| d.rotation);
        let from_tag = || {
            self.tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.trim().parse::<f64>().ok())
        };
        from_matrix
            .or_else(from_tag)
            .filter(|r| r.is_finite())
            .map(|r| (r.round() as i64).rem_euclid(360))
            .unwrap_or(0)
    }
}

/// Probe size, duration and audio presence of a clip.
///
/// Width and height are reported as displayed: ffmpeg autorotates on decode, so a quarter-turn
/// rotation swaps the coded dimensions.
pub fn probe_video(path: &Path) -> ReelResult<VideoInfo> {
    video_info(&run_ffprobe(path)?, path)
}

fn video_info(parsed: &ProbeOut, path: &Path) -> ReelResult<VideoInfo> {
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            ReelError::asset_unavailable(format!("no video stream in '{}'", path.display()))
        })?;
    let coded_width = video_stream
        .width
        .ok_or_else(|| ReelError::asset_unavailable("missing video width from ffprobe"))?;
    let coded_height = video_stream
        .height
        .ok_or_else(|| ReelError::asset_unavailable("missing video height from ffprobe"))?;
    let rotation = video_stream.rotation_degrees();
    let (width, height) = if rotation % 180 == 90 {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };
    if rotation != 0 {
        tracing::debug!(path = %path.display(), rotation, width, height, "rotated source");
    }
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoInfo {
        width,
        height,
        duration_sec: probe_duration(parsed),
        has_audio,
    })
}

pub fn probe_audio(path: &Path) -> ReelResult<AudioInfo> {
    let parsed = run_ffprobe(path)?;
    if !parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"))
    {
        return Err(ReelError::asset_unavailable(format!(
            "no audio stream in '{}'",
            path.display()
        )));
    }
    Ok(AudioInfo {
        duration_sec: probe_duration(&parsed),
    })
}

impl MediaBackend for FfmpegMedia {
    fn probe_video(&mut self, asset: &VideoAsset) -> ReelResult<VideoInfo> {
        probe_video(&asset.path)
    }

    fn probe_audio(&mut self, asset: &AudioAsset) -> ReelResult<AudioInfo> {
        probe_audio(&asset.path)
    }

    fn open_video(
        &mut self,
        asset: &VideoAsset,
        info: &VideoInfo,
        fps: Fps,
    ) -> ReelResult<Box<dyn VideoPlayback>> {
        Ok(Box::new(FfmpegVideoPlayback::spawn(
            &asset.path,
            info,
            fps,
            self.realtime,
        )?))
    }

    fn open_audio(&mut self, path: &Path) -> ReelResult<Box<dyn AudioPlayback>> {
        Ok(Box::new(FfmpegAudioPlayback::spawn(path, self.realtime)?))
    }
}

/// Child decoder process whose stdout streams raw media.
struct DecodeProcess {
    source: PathBuf,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl DecodeProcess {
    fn spawn(mut cmd: Command, source: &Path) -> ReelResult<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn().map_err(|e| {
            ReelError::asset_unavailable(format!(
                "failed to spawn ffmpeg for '{}' (is it installed and on PATH?): {e}",
                source.display()
            ))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelError::asset_unavailable("failed to open ffmpeg stdout"))?;
        Ok(Self {
            source: source.to_path_buf(),
            child: Some(child),
            stdout: Some(stdout),
        })
    }

    /// Fill `buf` as far as the stream allows; returns bytes read.
    fn read_full(&mut self, buf: &mut [u8]) -> ReelResult<usize> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(0);
        };
        let mut filled = 0usize;
        while filled < buf.len() {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ReelError::asset_unavailable(format!(
                        "decode read failed for '{}': {e}",
                        self.source.display()
                    )));
                }
            }
        }
        Ok(filled)
    }

    fn stop(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            // The decoder may still be blocked on a full pipe.
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for DecodeProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn base_decode_cmd(path: &Path, realtime: bool) -> Command {
    let mut cmd = tool_command("ffmpeg");
    cmd.args(["-v", "error", "-nostdin"]);
    if realtime {
        cmd.arg("-re");
    }
    cmd.arg("-i").arg(path);
    cmd
}

/// Streams RGBA frames resampled to the output frame rate.
pub struct FfmpegVideoPlayback {
    proc: DecodeProcess,
    width: u32,
    height: u32,
    fps: Fps,
    next_idx: u64,
    frame_buf: Vec<u8>,
    ended: bool,
}

impl FfmpegVideoPlayback {
    fn spawn(path: &Path, info: &VideoInfo, fps: Fps, realtime: bool) -> ReelResult<Self> {
        let frame_len = info.width as usize * info.height as usize * 4;
        if frame_len == 0 {
            return Err(ReelError::asset_unavailable(
                "decoded video frame size is zero (invalid source dimensions)",
            ));
        }
        let mut cmd = base_decode_cmd(path, realtime);
        cmd.args([
            "-an",
            "-vf",
            &format!("fps={}/{}", fps.num, fps.den),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ]);
        Ok(Self {
            proc: DecodeProcess::spawn(cmd, path)?,
            width: info.width,
            height: info.height,
            fps,
            next_idx: 0,
            frame_buf: vec![0u8; frame_len],
            ended: false,
        })
    }
}

impl VideoPlayback for FfmpegVideoPlayback {
    fn next_frame(&mut self) -> ReelResult<FrameEvent> {
        if self.ended {
            return Ok(FrameEvent::EndOfStream);
        }
        let n = self.proc.read_full(&mut self.frame_buf)?;
        if n < self.frame_buf.len() {
            self.ended = true;
            return Ok(FrameEvent::EndOfStream);
        }
        let pts_sec = self.fps.frames_to_secs(self.next_idx);
        self.next_idx += 1;
        Ok(FrameEvent::Frame(SourceFrame {
            pts_sec,
            width: self.width,
            height: self.height,
            rgba: self.frame_buf.clone(),
        }))
    }

    fn stop(&mut self) {
        self.ended = true;
        self.proc.stop();
    }
}

/// Streams interleaved stereo `f32le` at the mix sample rate.
pub struct FfmpegAudioPlayback {
    proc: DecodeProcess,
    byte_buf: Vec<u8>,
    ended: bool,
}

impl FfmpegAudioPlayback {
    fn spawn(path: &Path, realtime: bool) -> ReelResult<Self> {
        let mut cmd = base_decode_cmd(path, realtime);
        cmd.args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &MIX_CHANNELS.to_string(),
            "-ar",
            &MIX_SAMPLE_RATE.to_string(),
            "pipe:1",
        ]);
        Ok(Self {
            proc: DecodeProcess::spawn(cmd, path)?,
            byte_buf: Vec::new(),
            ended: false,
        })
    }
}

impl AudioPlayback for FfmpegAudioPlayback {
    fn read(&mut self, out: &mut [f32]) -> ReelResult<usize> {
        if self.ended {
            return Ok(0);
        }
        self.byte_buf.resize(out.len() * 4, 0);
        let n = self.proc.read_full(&mut self.byte_buf)?;
        let samples = n / 4;
        for (dst, chunk) in out.iter_mut().zip(self.byte_buf[..samples * 4].chunks_exact(4)) {
            *dst = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        if samples < out.len() {
            self.ended = true;
        }
        Ok(samples)
    }

    fn ended(&self) -> bool {
        self.ended
    }

    fn stop(&mut self) {
        self.ended = true;
        self.proc.stop();
    }
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be invoked from `PATH`.
pub fn ffmpeg_tools_available() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|tool| {
        tool_command(tool)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}
