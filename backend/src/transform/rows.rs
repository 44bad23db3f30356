//! Typed extract rows.
//!
//! A [`RawRecord`] is looked up by header name exactly once, into one of the
//! row structs below. From there on fields are addressed by name at compile
//! time, and [`FromExtract`] turns a row into the record that gets stored.

use chrono::{DateTime, Utc};

use crate::models::{EventRecord, EventStatus, FightStatRecord, FighterRecord};
use crate::parser::RawRecord;
use crate::store::Document;
use crate::transform::normalize::{
    parse_count, parse_date, parse_number, parse_percent, parse_strike_stat, parse_timestamp, text_or,
};

/// Default for an empty `control_time` cell.
pub const DEFAULT_CONTROL_TIME: &str = "0:00";

/// Per-run values that are not in the extract.
#[derive(Debug, Clone, Copy)]
pub struct ImportContext {
    /// Wall-clock the import runs against (event status).
    pub now: DateTime<Utc>,
}

impl ImportContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn at_now() -> Self {
        Self::new(Utc::now())
    }
}

/// A record kind that can be built from an extract row.
pub trait FromExtract: Document {
    fn from_raw(raw: &RawRecord, ctx: &ImportContext) -> Self;
}

// =============================================================================
// Fighters
// =============================================================================

/// One line of `fighters.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct FighterRow<'a> {
    pub url: &'a str,
    pub name: &'a str,
    pub nickname: &'a str,
    pub wins: &'a str,
    pub losses: &'a str,
    pub draws: &'a str,
    pub height: &'a str,
    pub weight: &'a str,
    pub reach: &'a str,
    pub stance: &'a str,
    pub dob: &'a str,
    pub slpm: &'a str,
    pub striking_accuracy: &'a str,
    pub sapm: &'a str,
    pub striking_defense: &'a str,
    pub takedown_avg: &'a str,
    pub takedown_accuracy: &'a str,
    pub takedown_defense: &'a str,
    pub submission_avg: &'a str,
    pub scraped_date: &'a str,
}

impl<'a> FighterRow<'a> {
    pub fn from_raw(raw: &'a RawRecord) -> Self {
        Self {
            url: raw.value("url"),
            name: raw.value("name"),
            nickname: raw.value("nickname"),
            wins: raw.value("wins"),
            losses: raw.value("losses"),
            draws: raw.value("draws"),
            height: raw.value("height"),
            weight: raw.value("weight"),
            reach: raw.value("reach"),
            stance: raw.value("stance"),
            dob: raw.value("dob"),
            slpm: raw.value("slpm"),
            striking_accuracy: raw.value("striking_accuracy"),
            sapm: raw.value("sapm"),
            striking_defense: raw.value("striking_defense"),
            takedown_avg: raw.value("takedown_avg"),
            takedown_accuracy: raw.value("takedown_accuracy"),
            takedown_defense: raw.value("takedown_defense"),
            submission_avg: raw.value("submission_avg"),
            scraped_date: raw.value("scraped_date"),
        }
    }

    pub fn to_record(&self) -> FighterRecord {
        FighterRecord {
            url: self.url.trim().to_string(),
            name: text_or(self.name, ""),
            nickname: text_or(self.nickname, ""),
            wins: parse_count(self.wins),
            losses: parse_count(self.losses),
            draws: parse_count(self.draws),
            height: text_or(self.height, ""),
            weight: text_or(self.weight, ""),
            // An empty cell means "never measured"; "--" still reads as 0
            reach: if self.reach.trim().is_empty() {
                None
            } else {
                Some(parse_number(self.reach))
            },
            stance: text_or(self.stance, ""),
            dob: parse_date(self.dob),
            slpm: parse_number(self.slpm),
            striking_accuracy: parse_percent(self.striking_accuracy),
            sapm: parse_number(self.sapm),
            striking_defense: parse_percent(self.striking_defense),
            takedown_avg: parse_number(self.takedown_avg),
            takedown_accuracy: parse_percent(self.takedown_accuracy),
            takedown_defense: parse_percent(self.takedown_defense),
            submission_avg: parse_number(self.submission_avg),
            scraped_date: parse_timestamp(self.scraped_date),
        }
    }
}

impl FromExtract for FighterRecord {
    fn from_raw(raw: &RawRecord, _ctx: &ImportContext) -> Self {
        FighterRow::from_raw(raw).to_record()
    }
}

// =============================================================================
// Events
// =============================================================================

/// One line of `events.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow<'a> {
    pub url: &'a str,
    pub event_id: &'a str,
    pub event_name: &'a str,
    pub date: &'a str,
    pub location: &'a str,
}

impl<'a> EventRow<'a> {
    pub fn from_raw(raw: &'a RawRecord) -> Self {
        Self {
            url: raw.value("url"),
            event_id: raw.value("event_id"),
            event_name: raw.value("event_name"),
            date: raw.value("date"),
            location: raw.value("location"),
        }
    }

    /// Status is decided here, against `ctx.now`, and stored as-is.
    pub fn to_record(&self, ctx: &ImportContext) -> EventRecord {
        let date = parse_date(self.date);
        EventRecord {
            event_id: self.event_id.trim().to_string(),
            url: text_or(self.url, ""),
            name: text_or(self.event_name, ""),
            date,
            location: text_or(self.location, ""),
            status: EventStatus::classify(date, ctx.now),
        }
    }
}

impl FromExtract for EventRecord {
    fn from_raw(raw: &RawRecord, ctx: &ImportContext) -> Self {
        EventRow::from_raw(raw).to_record(ctx)
    }
}

// =============================================================================
// Fight Stats
// =============================================================================

/// One line of `fightstats.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct FightStatRow<'a> {
    pub fight_id: &'a str,
    pub fighter_name: &'a str,
    pub fighter_position: &'a str,
    pub knockdowns: &'a str,
    pub sig_strikes: &'a str,
    pub sig_strikes_pct: &'a str,
    pub total_strikes: &'a str,
    pub takedowns: &'a str,
    pub takedown_pct: &'a str,
    pub submission_attempts: &'a str,
    pub reversals: &'a str,
    pub control_time: &'a str,
    pub sig_strikes_head: &'a str,
    pub sig_strikes_body: &'a str,
    pub sig_strikes_leg: &'a str,
    pub sig_strikes_distance: &'a str,
    pub sig_strikes_clinch: &'a str,
    pub sig_strikes_ground: &'a str,
}

impl<'a> FightStatRow<'a> {
    pub fn from_raw(raw: &'a RawRecord) -> Self {
        Self {
            fight_id: raw.value("fight_id"),
            fighter_name: raw.value("fighter_name"),
            fighter_position: raw.value("fighter_position"),
            knockdowns: raw.value("knockdowns"),
            sig_strikes: raw.value("sig_strikes"),
            sig_strikes_pct: raw.value("sig_strikes_pct"),
            total_strikes: raw.value("total_strikes"),
            takedowns: raw.value("takedowns"),
            takedown_pct: raw.value("takedown_pct"),
            submission_attempts: raw.value("submission_attempts"),
            reversals: raw.value("reversals"),
            control_time: raw.value("control_time"),
            sig_strikes_head: raw.value("sig_strikes_head"),
            sig_strikes_body: raw.value("sig_strikes_body"),
            sig_strikes_leg: raw.value("sig_strikes_leg"),
            sig_strikes_distance: raw.value("sig_strikes_distance"),
            sig_strikes_clinch: raw.value("sig_strikes_clinch"),
            sig_strikes_ground: raw.value("sig_strikes_ground"),
        }
    }

    pub fn to_record(&self) -> FightStatRecord {
        FightStatRecord {
            fight_id: self.fight_id.trim().to_string(),
            fighter_name: self.fighter_name.trim().to_string(),
            fighter_position: parse_count(self.fighter_position),
            knockdowns: parse_count(self.knockdowns),
            sig_strikes: parse_strike_stat(self.sig_strikes),
            sig_strikes_pct: parse_percent(self.sig_strikes_pct),
            total_strikes: parse_strike_stat(self.total_strikes),
            takedowns: parse_strike_stat(self.takedowns),
            takedown_pct: parse_percent(self.takedown_pct),
            submission_attempts: parse_count(self.submission_attempts),
            reversals: parse_count(self.reversals),
            control_time: text_or(self.control_time, DEFAULT_CONTROL_TIME),
            sig_strikes_head: parse_strike_stat(self.sig_strikes_head),
            sig_strikes_body: parse_strike_stat(self.sig_strikes_body),
            sig_strikes_leg: parse_strike_stat(self.sig_strikes_leg),
            sig_strikes_distance: parse_strike_stat(self.sig_strikes_distance),
            sig_strikes_clinch: parse_strike_stat(self.sig_strikes_clinch),
            sig_strikes_ground: parse_strike_stat(self.sig_strikes_ground),
        }
    }
}

impl FromExtract for FightStatRecord {
    fn from_raw(raw: &RawRecord, _ctx: &ImportContext) -> Self {
        FightStatRow::from_raw(raw).to_record()
    }
}
