use std::time::Duration;

use crate::session::state::Eta;

/// Progress after one more completed job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub percentage: u8,
    pub eta: Eta,
}

/// Completed/total counters with a running-average ETA over every job so far.
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    total: usize,
    completed: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Record one finished job; `elapsed` is the time since the session started.
    pub fn complete_job(&mut self, elapsed: Duration) -> ProgressUpdate {
        self.completed = (self.completed + 1).min(self.total.max(1));
        let remaining = self.total.saturating_sub(self.completed);
        let eta = if remaining > 0 {
            let avg = elapsed.as_secs_f64() / self.completed as f64;
            Eta::Remaining(Duration::from_secs_f64(avg * remaining as f64))
        } else {
            Eta::Finishing
        };
        ProgressUpdate {
            completed: self.completed,
            percentage: percentage(self.completed, self.total),
            eta,
        }
    }
}

/// `round(100 * done / total)`.
pub fn percentage(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((100.0 * done as f64 / total as f64).round() as u64).min(100) as u8
}
