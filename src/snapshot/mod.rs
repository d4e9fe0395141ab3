//! Snapshot orchestration: crawl, persist, rewrite and publish one root URL.

mod batch;
mod engine;
mod input;
mod inspect;
mod registry;

pub use batch::{BatchFailure, BatchReport, BatchRequest};
pub use engine::{
    SnapshotEngine, SnapshotError, SnapshotOutcome, SnapshotPhase, SnapshotRequest,
    SnapshotSummary,
};
pub use input::{validate_target_url, InputError};
pub use inspect::{inspect_markup, inspect_snapshot, InspectionReport};
pub use registry::InFlight;
