use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::foundation::error::{ReelError, ReelResult};

/// Lifecycle of one batch session.
///
/// `Idle -> Running <-> Paused`, `Running|Paused -> Stopping` on a stop request,
/// `Running -> Finished` when the loop completes or fails, and `Stopping|Finished -> Idle` only
/// through [`SessionHandle::reset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Stopping,
    Finished,
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    /// The user stopped the session; not an error.
    Stopped,
    Failed(String),
}

impl SessionOutcome {
    pub fn status_text(&self) -> String {
        match self {
            Self::Completed => "All videos processed!".to_string(),
            Self::Stopped => "Stopped!".to_string(),
            Self::Failed(msg) => format!("Error: {msg}"),
        }
    }
}

/// Estimated time left in the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eta {
    Remaining(Duration),
    /// The last job has completed.
    Finishing,
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remaining(d) => f.write_str(&format_eta(*d)),
            Self::Finishing => f.write_str("Finishing..."),
        }
    }
}

/// `"{m}m {s}s"`, or `"--:--"` for a zero estimate. Whole hours wrap away.
pub fn format_eta(d: Duration) -> String {
    let total = d.as_secs();
    if d.is_zero() {
        return "--:--".to_string();
    }
    format!("{}m {}s", (total / 60) % 60, total % 60)
}

/// Snapshot delivered to observers after each job and on every state transition.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressStatus {
    pub state: SessionState,
    pub percentage: u8,
    pub completed: usize,
    pub total: usize,
    pub status: String,
    pub eta: Option<Eta>,
}

impl Default for ProgressStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            percentage: 0,
            completed: 0,
            total: 0,
            status: String::new(),
            eta: None,
        }
    }
}

pub trait ProgressObserver: Send {
    fn on_status(&mut self, status: &ProgressStatus);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&ProgressStatus) + Send,
{
    fn on_status(&mut self, status: &ProgressStatus) {
        self(status)
    }
}

#[derive(Default)]
struct Observers {
    list: Vec<Box<dyn ProgressObserver>>,
    queue: VecDeque<ProgressStatus>,
    delivering: bool,
}

struct Shared {
    status: Mutex<ProgressStatus>,
    observers: Mutex<Observers>,
}

/// Cloneable control surface for a running session.
///
/// Every transition goes through a method here; the render loop only reads the state.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("status", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                status: Mutex::new(ProgressStatus::default()),
                observers: Mutex::new(Observers::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressStatus> {
        self.shared
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, observer: impl ProgressObserver + 'static) {
        self.observers().list.push(Box::new(observer));
    }

    fn observers(&self) -> MutexGuard<'_, Observers> {
        self.shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `snapshot` to every observer with no lock held, so observers may call back
    /// into the handle.
    ///
    /// Snapshots produced while a delivery is in progress are queued and delivered in order by
    /// the thread already delivering.
    fn notify(&self, snapshot: ProgressStatus) {
        let mut guard = self.observers();
        guard.queue.push_back(snapshot);
        if guard.delivering {
            return;
        }
        guard.delivering = true;
        loop {
            let Some(next) = guard.queue.pop_front() else {
                break;
            };
            let mut list = std::mem::take(&mut guard.list);
            drop(guard);
            for o in list.iter_mut() {
                o.on_status(&next);
            }
            guard = self.observers();
            let added = std::mem::replace(&mut guard.list, list);
            guard.list.extend(added);
        }
        guard.delivering = false;
    }

    /// Apply `f` under the lock and notify observers when it reports a change.
    fn update(&self, f: impl FnOnce(&mut ProgressStatus) -> bool) -> bool {
        let snapshot = {
            let mut status = self.lock();
            if !f(&mut status) {
                return false;
            }
            status.clone()
        };
        tracing::debug!(
            state = ?snapshot.state,
            status = snapshot.status.as_str(),
            "session status"
        );
        self.notify(snapshot);
        true
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn status(&self) -> ProgressStatus {
        self.lock().clone()
    }

    pub fn stop_requested(&self) -> bool {
        self.state() == SessionState::Stopping
    }

    /// `Running -> Paused`. Returns whether the state changed.
    pub fn pause(&self) -> bool {
        self.update(|s| {
            if s.state != SessionState::Running {
                return false;
            }
            s.state = SessionState::Paused;
            s.status = "Processing paused...".to_string();
            true
        })
    }

    /// `Paused -> Running`. Returns whether the state changed.
    pub fn resume(&self) -> bool {
        self.update(|s| {
            if s.state != SessionState::Paused {
                return false;
            }
            s.state = SessionState::Running;
            s.status = "Resuming...".to_string();
            true
        })
    }

    pub fn toggle_pause(&self) -> bool {
        self.pause() || self.resume()
    }

    /// `Running|Paused -> Stopping`. The job in flight still finalizes.
    pub fn stop(&self) -> bool {
        self.update(|s| {
            if !matches!(s.state, SessionState::Running | SessionState::Paused) {
                return false;
            }
            s.state = SessionState::Stopping;
            s.status = "Processing stopped by user.".to_string();
            true
        })
    }

    /// `Stopping|Finished -> Idle`, clearing progress.
    pub fn reset(&self) -> ReelResult<()> {
        let mut refused = None;
        self.update(|s| match s.state {
            SessionState::Stopping | SessionState::Finished => {
                *s = ProgressStatus::default();
                true
            }
            SessionState::Idle => false,
            other => {
                refused = Some(other);
                false
            }
        });
        match refused {
            Some(state) => Err(ReelError::validation(format!(
                "cannot reset a session while it is {state:?}"
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn begin(&self, total: usize) -> ReelResult<()> {
        let mut current = SessionState::Idle;
        let started = self.update(|s| {
            current = s.state;
            if s.state != SessionState::Idle {
                return false;
            }
            *s = ProgressStatus {
                state: SessionState::Running,
                total,
                status: "Starting...".to_string(),
                ..ProgressStatus::default()
            };
            true
        });
        if started {
            Ok(())
        } else {
            Err(ReelError::validation(format!(
                "session must be Idle to start (currently {current:?}); call reset first"
            )))
        }
    }

    /// Replace the status text without touching the state.
    pub(crate) fn set_status_text(&self, text: String) {
        self.update(|s| {
            if s.state == SessionState::Stopping {
                return false;
            }
            s.status = text;
            true
        });
    }

    pub(crate) fn set_progress(&self, completed: usize, percentage: u8, eta: Eta) {
        self.update(|s| {
            s.completed = completed;
            s.percentage = percentage;
            s.eta = Some(eta);
            true
        });
    }

    /// Counters only; the ETA is left untouched.
    pub(crate) fn set_counts(&self, completed: usize, percentage: u8) {
        self.update(|s| {
            s.completed = completed;
            s.percentage = percentage;
            true
        });
    }

    /// Leave the running loop. A stopped session stays in `Stopping` until reset.
    pub(crate) fn end(&self, outcome: &SessionOutcome) {
        self.end_with(outcome, outcome.status_text());
    }

    pub(crate) fn end_with(&self, outcome: &SessionOutcome, status: String) {
        self.update(|s| {
            if *outcome != SessionOutcome::Stopped {
                s.state = SessionState::Finished;
            }
            s.status = status;
            s.eta = None;
            true
        });
    }
}
