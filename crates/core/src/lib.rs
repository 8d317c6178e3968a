//! Domain core for archery practice logging: target scoring, the session
//! progress tracker, and read-only analysis over recorded sessions.

#![forbid(unsafe_code)]

pub mod analysis;
pub mod model;
pub mod scoring;
pub mod time;
pub mod tracker;

pub use time::Clock;
pub use tracker::{
    AdvancePolicy, ArrowSlot, RegisterOutcome, SeriesStatus, SessionTracker, TrackerError,
    TrackerSnapshot,
};
