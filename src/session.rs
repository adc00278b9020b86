/// Audio-only extraction over the video pool.
pub mod extract;
/// Completed/total counters and the running-average ETA.
pub mod progress;
/// Batch render controller.
pub mod queue;
/// Session state machine, status records and observers.
pub mod state;
