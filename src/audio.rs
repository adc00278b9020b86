/// Two-tap mixing graph with job-scoped destinations.
pub mod mix;
