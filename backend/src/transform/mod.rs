//! Transformation module.
//!
//! Everything between an assembled extract and the store:
//! - Normalize: total field coercions
//! - Rows: typed rows and their records
//! - Loader: natural-key upserts with per-row error counting
//! - Pipeline: staged import runs
//! - Reconstruct: fight matchups and other reads

pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod reconstruct;
pub mod rows;

pub use loader::{load_extract, LoadSummary, LoaderOptions};
pub use pipeline::*;
pub use reconstruct::{event_status_counts, fighter_history, group_matchups, reconstruct, EventStatusCounts};
pub use rows::{FromExtract, ImportContext};
