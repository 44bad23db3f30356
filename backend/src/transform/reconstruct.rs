//! Fight reconstruction and other store reads.
//!
//! Fight stats are stored one row per fighter per fight. Fight ids are
//! `<eventId>_<n>`, so an event's fights are found by id prefix and regrouped
//! into [`FightMatchup`]s on every call. Nothing here is cached.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::StoreResult;
use crate::models::{EventRecord, EventStatus, FightMatchup, FightStatRecord};
use crate::store::{find_records, Filter, RecordStore, SortKey};

/// Separator between the event id and the fight number in a fight id.
pub const FIGHT_ID_SEPARATOR: char = '_';

/// Matchups for an event, ordered by fight id.
///
/// Matching on the id prefix is case-insensitive. A fight whose opponent row
/// is missing still comes back, with a single fighter. A blank event id
/// matches nothing.
pub fn reconstruct<S>(store: &S, event_id: &str) -> StoreResult<Vec<FightMatchup>>
where
    S: RecordStore + ?Sized,
{
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Ok(Vec::new());
    }

    let prefix = format!("{}{}", event_id, FIGHT_ID_SEPARATOR);
    let stats: Vec<FightStatRecord> = find_records(
        store,
        &Filter::prefix_ci("fightId", &prefix),
        &[SortKey::asc("fightId"), SortKey::asc("fighterPosition")],
        None,
    )?;

    Ok(group_matchups(stats))
}

/// Group stat rows by exact fight id, each group sorted by corner position.
pub fn group_matchups(stats: impl IntoIterator<Item = FightStatRecord>) -> Vec<FightMatchup> {
    let mut groups: BTreeMap<String, Vec<FightStatRecord>> = BTreeMap::new();
    for stat in stats {
        groups.entry(stat.fight_id.clone()).or_default().push(stat);
    }

    groups
        .into_iter()
        .map(|(fight_id, mut fighters)| {
            // Stable: equal positions keep store order
            fighters.sort_by_key(|f| f.fighter_position);
            FightMatchup { fight_id, fighters }
        })
        .collect()
}

/// A fighter's stat rows, most recent fight id first.
///
/// `name` is matched exactly; fighter names in fight stats are free text.
pub fn fighter_history<S>(store: &S, name: &str, limit: Option<usize>) -> StoreResult<Vec<FightStatRecord>>
where
    S: RecordStore + ?Sized,
{
    find_records(
        store,
        &Filter::eq("fighterName", name.trim()),
        &[SortKey::desc("fightId")],
        limit,
    )
}

/// Number of events per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventStatusCounts {
    pub upcoming: usize,
    pub completed: usize,
}

pub fn event_status_counts<S>(store: &S) -> StoreResult<EventStatusCounts>
where
    S: RecordStore + ?Sized,
{
    let events: Vec<EventRecord> = find_records(store, &Filter::All, &[], None)?;
    Ok(events
        .iter()
        .fold(EventStatusCounts::default(), |mut counts, event| {
            match event.status {
                EventStatus::Upcoming => counts.upcoming += 1,
                EventStatus::Completed => counts.completed += 1,
            }
            counts
        }))
}
