use crate::foundation::error::{ReelError, ReelResult};
use crate::media::source::AudioPlayback;

/// Internal audio mixing sample rate used across decode/mix/encode pipeline.
pub const MIX_SAMPLE_RATE: u32 = 48_000;
/// Interleaved channel count of every mixed buffer.
pub const MIX_CHANNELS: u16 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DestinationId(u64);

/// The single sink that receives the summed taps of one job.
///
/// Returned by [`AudioMixGraph::connect_job`] and consumed by
/// [`AudioMixGraph::disconnect_job`].
#[derive(Debug, PartialEq, Eq)]
pub struct MixDestination {
    id: DestinationId,
}

impl MixDestination {
    pub fn id(&self) -> DestinationId {
        self.id
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tap {
    /// The selected clip's embedded audio.
    Original,
    /// The selected added-audio track.
    Added,
}

/// Per-job sources and gains handed to [`AudioMixGraph::connect_job`].
pub struct JobAudio {
    /// `None` when the clip has no audio track; the tap is still connected and stays silent.
    pub original: Option<Box<dyn AudioPlayback>>,
    pub original_gain: f32,
    /// `None` when the job has no added audio; the added tap stays disconnected.
    pub added: Option<(Box<dyn AudioPlayback>, f32)>,
}

struct GainTap {
    gain: f32,
    source: Option<Box<dyn AudioPlayback>>,
    connected_to: Option<DestinationId>,
    scratch: Vec<f32>,
}

impl GainTap {
    fn new() -> Self {
        Self {
            gain: 1.0,
            source: None,
            connected_to: None,
            scratch: Vec::new(),
        }
    }

    fn mix_into(&mut self, dest: DestinationId, out: &mut [f32]) -> ReelResult<()> {
        if self.connected_to != Some(dest) {
            return Ok(());
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };
        self.scratch.resize(out.len(), 0.0);
        let n = source.read(&mut self.scratch)?;
        let len = n.min(out.len());
        for (o, s) in out.iter_mut().zip(&self.scratch[..len]) {
            *o += s * self.gain;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        self.connected_to = None;
    }
}

/// Long-lived two-tap mixing graph.
///
/// The gain taps are built once and reused for every job; only their connection to a job's
/// [`MixDestination`] is job-scoped. A new destination cannot be connected while the previous
/// one is still wired, so audio from two jobs can never sum together.
pub struct AudioMixGraph {
    original: GainTap,
    added: GainTap,
    next_id: u64,
}

impl Default for AudioMixGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioMixGraph {
    pub fn new() -> Self {
        Self {
            original: GainTap::new(),
            added: GainTap::new(),
            next_id: 0,
        }
    }

    /// Wire this job's sources into a fresh destination.
    pub fn connect_job(&mut self, job: JobAudio) -> ReelResult<MixDestination> {
        if self.original.connected_to.is_some() || self.added.connected_to.is_some() {
            return Err(ReelError::render(
                "previous job's mix destination is still connected",
            ));
        }
        let id = DestinationId(self.next_id);
        self.next_id += 1;

        self.original.gain = job.original_gain;
        self.original.source = job.original;
        self.original.connected_to = Some(id);

        if let Some((source, gain)) = job.added {
            self.added.gain = gain;
            self.added.source = Some(source);
            self.added.connected_to = Some(id);
        }

        tracing::debug!(
            dest = id.0,
            added = self.added.connected_to.is_some(),
            "mix destination connected"
        );
        Ok(MixDestination { id })
    }

    pub fn is_connected(&self, tap: Tap, dest: &MixDestination) -> bool {
        let tap = match tap {
            Tap::Original => &self.original,
            Tap::Added => &self.added,
        };
        tap.connected_to == Some(dest.id)
    }

    /// Pull `out.len()` interleaved samples: the gained sum of every tap wired to `dest`,
    /// clamped to `[-1, 1]`.
    pub fn pull(&mut self, dest: &MixDestination, out: &mut [f32]) -> ReelResult<()> {
        out.fill(0.0);
        for tap in [&mut self.original, &mut self.added] {
            tap.mix_into(dest.id, out)?;
        }
        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
        Ok(())
    }

    /// `true` once the added track wired to `dest` reports end-of-stream.
    pub fn added_ended(&self, dest: &MixDestination) -> bool {
        self.added.connected_to == Some(dest.id)
            && self.added.source.as_ref().is_some_and(|s| s.ended())
    }

    /// Tear down `dest`, stopping and releasing both sources.
    pub fn disconnect_job(&mut self, dest: MixDestination) {
        for tap in [&mut self.original, &mut self.added] {
            if tap.connected_to == Some(dest.id) {
                tap.disconnect();
            }
        }
        tracing::debug!(dest = dest.id.0, "mix destination disconnected");
    }
}
