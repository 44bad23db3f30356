//! # Octagon - fight data ingestion
//!
//! Octagon loads scraped MMA extracts (fighters, events, per-fighter fight
//! statistics) into a document store, keyed by each record's natural key, and
//! rebuilds fight matchups from the stored statistics on demand.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV Extract│────▶│   Parser    │────▶│  Transform  │────▶│    Store    │
//! │  (ISO/UTF8) │     │ (tokenize)  │     │ (rows+load) │     │ (by nat key)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                                         ┌─────────────┐            │
//!                                         │ Reconstruct │◀───────────┘
//!                                         │  (matchups) │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use octagon::{ExtractSources, ImportPlan, Importer, JsonFileStore, LoaderOptions};
//!
//! let store = JsonFileStore::open(".octagon/store")?;
//! let summary = Importer::new(&store, LoaderOptions::default())
//!     .run(&ImportPlan::full(), &ExtractSources::in_dir("data"))?;
//! println!("Imported {} rows", summary.total_imported());
//!
//! for fight in octagon::reconstruct(&store, "UFC300")? {
//!     println!("{}: {:?}", fight.fight_id, fight.fighter_names());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Stored records and the matchup view
//! - [`parser`] - Extract decoding, tokenizing and assembly
//! - [`transform`] - Normalizers, typed rows, loader, import runs, reconstruction
//! - [`store`] - Record store trait, in-memory and JSON-file stores
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server and log broadcasting

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Storage
pub mod store;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ExtractError, ExtractResult, PipelineError, PipelineResult, RowError, ServerError, StoreError,
    StoreResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    EventRecord, EventStatus, FightMatchup, FightStatRecord, FighterRecord, RecordKind, StrikeStat,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    assemble, decode_content, detect_encoding, parse_bytes_auto, read_extract, tokenize, MalformedRow,
    ParsedExtract, RawRecord,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::normalize::{parse_date, parse_number, parse_percent, parse_strike_stat};
pub use transform::{
    event_status_counts, fighter_history, import_extract, load_extract, reconstruct, store_counts,
    ExtractSources, ImportContext, ImportPlan, ImportStage, Importer, LoadSummary, LoaderOptions, RunSummary,
    StageOutcome, StageReport,
};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{Filter, JsonFileStore, MemoryStore, NaturalKey, RecordStore, SortKey, UpsertOutcome};

// =============================================================================
// Re-exports - Config & API
// =============================================================================

pub use config::Config;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
