//! Domain models for the Octagon ingestion pipeline.
//!
//! This module contains the records persisted by an import run and the
//! derived matchup view:
//!
//! - [`FighterRecord`] - Fighter biography and career rates, keyed by `url`
//! - [`EventRecord`] - Event card, keyed by `eventId`
//! - [`FightStatRecord`] - One fighter's statistics for one fight, keyed by (`fightId`, `fighterName`)
//! - [`StrikeStat`] - Landed/attempted pair embedded in fight stats
//! - [`FightMatchup`] - Fight stats regrouped per fight (never persisted)
//! - [`RecordKind`] - Which collection a record belongs to

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Document, NaturalKey};

// =============================================================================
// Record Kind
// =============================================================================

/// The three persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "fighters")]
    Fighters,
    #[serde(rename = "events")]
    Events,
    #[serde(rename = "fightstats")]
    FightStats,
}

impl RecordKind {
    /// All kinds, in import order.
    pub const ALL: [RecordKind; 3] = [RecordKind::Fighters, RecordKind::Events, RecordKind::FightStats];

    /// Collection name, also the extract's file stem (`fighters.csv`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fighters => "fighters",
            Self::Events => "events",
            Self::FightStats => "fightstats",
        }
    }

    /// Parse a collection name. Accepts a few spellings used by operators.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "fighters" | "fighter" => Some(Self::Fighters),
            "events" | "event" => Some(Self::Events),
            "fightstats" | "fight_stats" | "fight-stats" | "stats" => Some(Self::FightStats),
            _ => None,
        }
    }

    /// Stored field holding the first natural key part.
    pub fn lead_key_field(&self) -> &'static str {
        match self {
            Self::Fighters => "url",
            Self::Events => "eventId",
            Self::FightStats => "fightId",
        }
    }

    /// Extract columns that make up the natural key.
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Fighters => &["url"],
            Self::Events => &["event_id"],
            Self::FightStats => &["fight_id", "fighter_name"],
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Fighter
// =============================================================================

/// A fighter's biography, record and career rate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FighterRecord {
    pub url: String,
    pub name: String,
    pub nickname: String,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    pub height: String,
    pub weight: String,
    pub reach: Option<f64>,
    pub stance: String,
    pub dob: Option<NaiveDate>,
    /// Significant strikes landed per minute
    pub slpm: f64,
    /// Percent, 0-100
    pub striking_accuracy: f64,
    /// Significant strikes absorbed per minute
    pub sapm: f64,
    pub striking_defense: f64,
    /// Takedowns per 15 minutes
    pub takedown_avg: f64,
    pub takedown_accuracy: f64,
    pub takedown_defense: f64,
    /// Submission attempts per 15 minutes
    pub submission_avg: f64,
    pub scraped_date: Option<DateTime<Utc>>,
}

impl Document for FighterRecord {
    const KIND: RecordKind = RecordKind::Fighters;

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::single("url", &self.url)
    }
}

// =============================================================================
// Event
// =============================================================================

/// Whether an event had yet to happen when it was imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Completed,
}

impl EventStatus {
    /// Classify an event date against the import wall-clock.
    ///
    /// Upcoming only when the date is known and its start (midnight UTC) is
    /// strictly after `now`. Unknown dates are completed.
    pub fn classify(date: Option<NaiveDate>, now: DateTime<Utc>) -> Self {
        match date.and_then(|d| d.and_hms_opt(0, 0, 0)) {
            Some(start) if start.and_utc() > now => Self::Upcoming,
            _ => Self::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Completed => "completed",
        }
    }
}

/// An event card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_id: String,
    pub url: String,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub location: String,
    /// Set once at import time, never re-derived.
    pub status: EventStatus,
}

impl Document for EventRecord {
    const KIND: RecordKind = RecordKind::Events;

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::single("eventId", &self.event_id)
    }
}

// =============================================================================
// Fight Stats
// =============================================================================

/// A landed/attempted pair, e.g. "12 of 34".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeStat {
    pub landed: i64,
    pub attempted: i64,
}

impl StrikeStat {
    pub fn new(landed: i64, attempted: i64) -> Self {
        Self { landed, attempted }
    }
}

/// One fighter's statistics for one fight.
///
/// `fighter_name` is a soft reference: nothing checks that a fighter with
/// that name was imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightStatRecord {
    pub fight_id: String,
    pub fighter_name: String,
    /// Corner index, 1 = first listed
    pub fighter_position: i64,
    pub knockdowns: i64,
    pub sig_strikes: StrikeStat,
    pub sig_strikes_pct: f64,
    pub total_strikes: StrikeStat,
    pub takedowns: StrikeStat,
    pub takedown_pct: f64,
    pub submission_attempts: i64,
    pub reversals: i64,
    pub control_time: String,
    pub sig_strikes_head: StrikeStat,
    pub sig_strikes_body: StrikeStat,
    pub sig_strikes_leg: StrikeStat,
    pub sig_strikes_distance: StrikeStat,
    pub sig_strikes_clinch: StrikeStat,
    pub sig_strikes_ground: StrikeStat,
}

impl Document for FightStatRecord {
    const KIND: RecordKind = RecordKind::FightStats;

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::compound([
            ("fightId", self.fight_id.as_str()),
            ("fighterName", self.fighter_name.as_str()),
        ])
    }
}

// =============================================================================
// Matchup
// =============================================================================

/// All stat rows sharing one fight id, ordered by corner position.
///
/// A matchup with a single fighter may just mean the opponent's row has not
/// been imported yet; treat it as possibly incomplete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FightMatchup {
    pub fight_id: String,
    pub fighters: Vec<FightStatRecord>,
}

impl FightMatchup {
    pub fn is_partial(&self) -> bool {
        self.fighters.len() < 2
    }

    pub fn fighter_names(&self) -> Vec<&str> {
        self.fighters.iter().map(|f| f.fighter_name.as_str()).collect()
    }
}
