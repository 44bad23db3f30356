//! Import runs.
//!
//! A run executes an [`ImportPlan`], an ordered list of independent stages:
//!
//! ```text
//! [Clear] -> Fighters -> Events -> FightStats
//! ```
//!
//! Each load stage reads one extract, hands it to the loader and records a
//! [`StageReport`]. An unusable extract fails its own stage only; the next
//! stage still runs. Every stage is idempotent, so rerunning a plan (or just
//! the stages that failed) converges on the same store contents.
//!
//! # Example
//!
//! ```rust,ignore
//! use octagon::store::MemoryStore;
//! use octagon::transform::{ExtractSources, ImportPlan, Importer, LoaderOptions};
//!
//! let store = MemoryStore::new();
//! let summary = Importer::new(&store, LoaderOptions::default())
//!     .run(&ImportPlan::full().with_clear(), &ExtractSources::in_dir("data"))?;
//! println!("{} rows imported", summary.total_imported());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

use super::loader::{load_extract, LoadSummary, LoaderOptions};
use super::rows::ImportContext;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::{ExtractError, PipelineResult, StoreResult};
use crate::models::{EventRecord, FightStatRecord, FighterRecord, RecordKind};
use crate::parser::{read_extract, ParsedExtract};
use crate::store::RecordStore;

/// Exit code for a run where every stage completed.
pub const EXIT_OK: i32 = 0;
/// Exit code when the store is unreachable or setup failed.
pub const EXIT_FATAL: i32 = 1;
/// Exit code when at least one extract could not be used.
pub const EXIT_STRUCTURAL: i32 = 2;

// =============================================================================
// Plan
// =============================================================================

/// One step of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStage {
    /// Remove the documents of the kinds the plan loads (every kind when it
    /// loads none).
    Clear,
    Fighters,
    Events,
    #[serde(rename = "fightstats")]
    FightStats,
}

impl ImportStage {
    /// Canonical order. Fighters load before the fight stats that name them.
    pub const ORDER: [ImportStage; 4] = [Self::Clear, Self::Fighters, Self::Events, Self::FightStats];

    pub fn kind(&self) -> Option<RecordKind> {
        match self {
            Self::Clear => None,
            Self::Fighters => Some(RecordKind::Fighters),
            Self::Events => Some(RecordKind::Events),
            Self::FightStats => Some(RecordKind::FightStats),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Fighters => "fighters",
            Self::Events => "events",
            Self::FightStats => "fightstats",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if name.trim().eq_ignore_ascii_case("clear") {
            return Some(Self::Clear);
        }
        RecordKind::from_name(name).map(Self::from)
    }
}

impl From<RecordKind> for ImportStage {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Fighters => Self::Fighters,
            RecordKind::Events => Self::Events,
            RecordKind::FightStats => Self::FightStats,
        }
    }
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered stages to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    stages: Vec<ImportStage>,
}

impl ImportPlan {
    /// Run exactly these stages, in this order.
    pub fn new(stages: Vec<ImportStage>) -> Self {
        Self { stages }
    }

    /// Fighters, events, then fight stats.
    pub fn full() -> Self {
        Self::new(vec![ImportStage::Fighters, ImportStage::Events, ImportStage::FightStats])
    }

    /// A subset of stages, put back in canonical order, each at most once.
    pub fn only(stages: impl IntoIterator<Item = ImportStage>) -> Self {
        let wanted: Vec<ImportStage> = stages.into_iter().collect();
        Self::new(
            ImportStage::ORDER
                .into_iter()
                .filter(|s| wanted.contains(s))
                .collect(),
        )
    }

    /// Prepend a clear step unless the plan already starts with one.
    pub fn with_clear(mut self) -> Self {
        if self.stages.first() != Some(&ImportStage::Clear) {
            self.stages.insert(0, ImportStage::Clear);
        }
        self
    }

    pub fn stages(&self) -> &[ImportStage] {
        &self.stages
    }

    /// Kinds a clear step removes: those with a load stage in the plan, or
    /// all of them for a plan that only clears.
    pub fn cleared_kinds(&self) -> Vec<RecordKind> {
        let loaded: Vec<RecordKind> = self.stages.iter().filter_map(ImportStage::kind).collect();
        if loaded.is_empty() {
            RecordKind::ALL.to_vec()
        } else {
            RecordKind::ALL.into_iter().filter(|k| loaded.contains(k)).collect()
        }
    }
}

impl Default for ImportPlan {
    fn default() -> Self {
        Self::full()
    }
}

/// Where each extract is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSources {
    pub fighters: PathBuf,
    pub events: PathBuf,
    pub fightstats: PathBuf,
}

impl ExtractSources {
    /// `<dir>/fighters.csv`, `<dir>/events.csv`, `<dir>/fightstats.csv`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let file = |kind: RecordKind| dir.join(format!("{}.csv", kind.as_str()));
        Self {
            fighters: file(RecordKind::Fighters),
            events: file(RecordKind::Events),
            fightstats: file(RecordKind::FightStats),
        }
    }

    pub fn path(&self, kind: RecordKind) -> &Path {
        match kind {
            RecordKind::Fighters => &self.fighters,
            RecordKind::Events => &self.events,
            RecordKind::FightStats => &self.fightstats,
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// What a stage did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum StageOutcome {
    /// Extract loaded; row errors are inside the summary.
    #[serde(rename_all = "camelCase")]
    Loaded {
        source: String,
        encoding: String,
        summary: LoadSummary,
    },
    /// Documents removed, per kind.
    Cleared { removed: BTreeMap<RecordKind, usize> },
    /// The extract could not be used at all. `unreadable` is set when the
    /// file itself could not be read (as opposed to a bad header).
    Failed { message: String, unreadable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage: ImportStage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub elapsed_ms: u64,
}

impl StageReport {
    pub fn load_summary(&self) -> Option<&LoadSummary> {
        match &self.outcome {
            StageOutcome::Loaded { summary, .. } => Some(summary),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, StageOutcome::Failed { .. })
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    /// Documents per kind once the run finished.
    pub counts: BTreeMap<RecordKind, usize>,
}

impl RunSummary {
    pub fn stage(&self, stage: ImportStage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn total_imported(&self) -> usize {
        self.stages
            .iter()
            .filter_map(StageReport::load_summary)
            .map(|s| s.imported_count)
            .sum()
    }

    pub fn total_errors(&self) -> usize {
        self.stages
            .iter()
            .filter_map(StageReport::load_summary)
            .map(|s| s.error_count)
            .sum()
    }

    pub fn failed_stages(&self) -> usize {
        self.stages.iter().filter(|r| r.is_failed()).count()
    }

    /// Row errors alone never make a run fail.
    pub fn exit_code(&self) -> i32 {
        if self.failed_stages() > 0 {
            EXIT_STRUCTURAL
        } else {
            EXIT_OK
        }
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Load an already-parsed extract as `kind`.
pub fn import_extract<S>(
    store: &S,
    kind: RecordKind,
    extract: &ParsedExtract,
    ctx: &ImportContext,
    options: &LoaderOptions,
) -> Result<LoadSummary, ExtractError>
where
    S: RecordStore + ?Sized,
{
    match kind {
        RecordKind::Fighters => load_extract::<FighterRecord, S>(store, extract, ctx, options),
        RecordKind::Events => load_extract::<EventRecord, S>(store, extract, ctx, options),
        RecordKind::FightStats => load_extract::<FightStatRecord, S>(store, extract, ctx, options),
    }
}

/// Per-kind document counts.
pub fn store_counts<S>(store: &S) -> StoreResult<BTreeMap<RecordKind, usize>>
where
    S: RecordStore + ?Sized,
{
    RecordKind::ALL
        .into_iter()
        .map(|kind| store.count(kind).map(|n| (kind, n)))
        .collect()
}

/// Runs import plans against one store.
pub struct Importer<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    options: LoaderOptions,
}

impl<'s, S: RecordStore + ?Sized> Importer<'s, S> {
    pub fn new(store: &'s S, options: LoaderOptions) -> Self {
        Self { store, options }
    }

    /// Run `plan`, classifying events against the current time.
    pub fn run(&self, plan: &ImportPlan, sources: &ExtractSources) -> PipelineResult<RunSummary> {
        self.run_with(plan, sources, ImportContext::at_now())
    }

    /// Run `plan` with an explicit import context.
    ///
    /// A store failure while clearing or counting ends the run with an error.
    /// Extract problems only fail their own stage.
    pub fn run_with(
        &self,
        plan: &ImportPlan,
        sources: &ExtractSources,
        ctx: ImportContext,
    ) -> PipelineResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        log_info(format!("🚀 Import run {} ({} stages)", run_id, plan.stages().len()));

        let mut stages = Vec::with_capacity(plan.stages().len());
        for &stage in plan.stages() {
            let start = Instant::now();
            let outcome = match stage.kind() {
                None => self.clear(&plan.cleared_kinds())?,
                Some(kind) => self.load_stage(kind, sources.path(kind), &ctx),
            };
            stages.push(StageReport {
                stage,
                outcome,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        let counts = store_counts(self.store)?;
        log_info("📊 Database summary:");
        for (kind, n) in &counts {
            log_info_indent(format!("{}: {}", kind, n), 1);
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stages,
            counts,
        };
        if summary.failed_stages() > 0 {
            log_warning(format!("{} stage(s) failed, rerun them once fixed", summary.failed_stages()));
        } else {
            log_success("Import completed");
        }
        Ok(summary)
    }

    fn clear(&self, kinds: &[RecordKind]) -> StoreResult<StageOutcome> {
        let names: Vec<&str> = kinds.iter().map(RecordKind::as_str).collect();
        log_info(format!("🗑️  Clearing existing data ({})...", names.join(", ")));
        let mut removed = BTreeMap::new();
        for &kind in kinds {
            removed.insert(kind, self.store.clear(kind)?);
        }
        log_success(format!("Cleared {} documents", removed.values().sum::<usize>()));
        Ok(StageOutcome::Cleared { removed })
    }

    fn load_stage(&self, kind: RecordKind, path: &Path, ctx: &ImportContext) -> StageOutcome {
        log_info(format!("📥 Importing {} from {}...", kind, path.display()));

        let result = read_extract(path).and_then(|extract| {
            log_success(format!(
                "Found {} {} rows ({})",
                extract.row_count(),
                kind,
                extract.encoding
            ));
            import_extract(self.store, kind, &extract, ctx, &self.options).map(|summary| (extract, summary))
        });

        match result {
            Ok((extract, summary)) => {
                log_success(format!(
                    "Imported {} {} ({} errors)",
                    summary.imported_count, kind, summary.error_count
                ));
                StageOutcome::Loaded {
                    source: path.display().to_string(),
                    encoding: extract.encoding,
                    summary,
                }
            }
            Err(err) => {
                log_error(format!("Skipping {}: {}", kind, err));
                StageOutcome::Failed {
                    message: err.to_string(),
                    unreadable: err.is_unreadable(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventStatus;
    use crate::store::{find_records, Filter, JsonFileStore, MemoryStore, SortKey};
    use crate::transform::reconstruct;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const FIGHTERS: &str = "url,name,nickname,wins,losses,draws,reach,dob\n\
        http://f/a,Alexander Volkanovski,The Great,26,4,0,71,\"Sep 29, 1988\"\n\
        http://f/b,Ilia Topuria,El Matador,16,0,0,--,--\n";

    const EVENTS: &str = "url,event_id,event_name,date,location\n\
        http://e/298,ufc298,UFC 298,\"February 17, 2024\",\"Anaheim, California, USA\"\n\
        http://e/999,ufc999,UFC 999,2030-01-01,TBD\n";

    const FIGHTSTATS: &str = "fight_id,fighter_name,fighter_position,sig_strikes,control_time\n\
        ufc298_1,Ilia Topuria,2,37 of 63,0:12\n\
        ufc298_1,Alexander Volkanovski,1,33 of 73,\n\
        ufc298_2,Robert Whittaker,1,60 of 110\n";

    fn write_extracts() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("fighters.csv"), FIGHTERS).unwrap();
        fs::write(dir.path().join("events.csv"), EVENTS).unwrap();
        fs::write(dir.path().join("fightstats.csv"), FIGHTSTATS).unwrap();
        dir
    }

    fn ctx() -> ImportContext {
        ImportContext::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_full_run() {
        let dir = write_extracts();
        let store = MemoryStore::new();
        let importer = Importer::new(&store, LoaderOptions::default());

        let summary = importer
            .run_with(&ImportPlan::full(), &ExtractSources::in_dir(dir.path()), ctx())
            .unwrap();

        assert_eq!(summary.stages.len(), 3);
        assert_eq!(summary.counts[&RecordKind::Fighters], 2);
        assert_eq!(summary.counts[&RecordKind::Events], 2);
        assert_eq!(summary.counts[&RecordKind::FightStats], 2);
        // The short fight stats row is dropped, not fatal
        let stats = summary.stage(ImportStage::FightStats).unwrap().load_summary().unwrap();
        assert_eq!(stats.malformed_rows, 1);
        assert_eq!(summary.total_imported(), 6);
        assert_eq!(summary.total_errors(), 1);
        assert_eq!(summary.exit_code(), EXIT_OK);

        let events: Vec<EventRecord> =
            find_records(&store, &Filter::eq("eventId", "ufc999"), &[], None).unwrap();
        assert_eq!(events[0].status, EventStatus::Upcoming);

        let matchups = reconstruct::reconstruct(&store, "UFC298").unwrap();
        assert_eq!(matchups.len(), 1);
        assert_eq!(
            matchups[0].fighter_names(),
            vec!["Alexander Volkanovski", "Ilia Topuria"]
        );
        assert_eq!(matchups[0].fighters[0].control_time, "0:00");
    }

    #[test]
    fn test_rerun_converges() {
        let dir = write_extracts();
        let store = MemoryStore::new();
        let importer = Importer::new(&store, LoaderOptions::default());
        let sources = ExtractSources::in_dir(dir.path());

        let first = importer.run_with(&ImportPlan::full(), &sources, ctx()).unwrap();
        let second = importer.run_with(&ImportPlan::full(), &sources, ctx()).unwrap();

        assert_eq!(first.counts, second.counts);
        assert_ne!(first.run_id, second.run_id);
        let fighters = second.stage(ImportStage::Fighters).unwrap().load_summary().unwrap();
        assert_eq!(fighters.replaced, 2);
    }

    type Snapshot = (Vec<FighterRecord>, Vec<EventRecord>, Vec<FightStatRecord>);

    fn snapshot(store: &dyn RecordStore) -> Snapshot {
        (
            find_records(store, &Filter::All, &[SortKey::asc("url")], None).unwrap(),
            find_records(store, &Filter::All, &[SortKey::asc("eventId")], None).unwrap(),
            find_records(
                store,
                &Filter::All,
                &[SortKey::asc("fightId"), SortKey::asc("fighterName")],
                None,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_rerun_keeps_every_field() {
        let dir = write_extracts();
        let store_dir = tempdir().unwrap();
        let store = JsonFileStore::open(store_dir.path()).unwrap();
        let importer = Importer::new(&store, LoaderOptions::default());
        let sources = ExtractSources::in_dir(dir.path());

        importer.run_with(&ImportPlan::full(), &sources, ctx()).unwrap();
        let first = snapshot(&store);
        assert_eq!((first.0.len(), first.1.len(), first.2.len()), (2, 2, 2));

        importer.run_with(&ImportPlan::full(), &sources, ctx()).unwrap();
        assert_eq!(snapshot(&store), first);

        // Same documents when read back from disk
        let reopened = JsonFileStore::open(store_dir.path()).unwrap();
        assert_eq!(snapshot(&reopened), first);
    }

    #[test]
    fn test_missing_extract_fails_only_its_stage() {
        let dir = write_extracts();
        fs::remove_file(dir.path().join("events.csv")).unwrap();
        let store = MemoryStore::new();

        let summary = Importer::new(&store, LoaderOptions::default())
            .run_with(&ImportPlan::full(), &ExtractSources::in_dir(dir.path()), ctx())
            .unwrap();

        let events = summary.stage(ImportStage::Events).unwrap();
        assert!(matches!(events.outcome, StageOutcome::Failed { unreadable: true, .. }));
        assert_eq!(summary.counts[&RecordKind::FightStats], 2);
        assert_eq!(summary.exit_code(), EXIT_STRUCTURAL);
    }

    #[test]
    fn test_clear_stage() {
        let dir = write_extracts();
        let store = MemoryStore::new();
        let importer = Importer::new(&store, LoaderOptions::default());
        let sources = ExtractSources::in_dir(dir.path());
        importer.run_with(&ImportPlan::full(), &sources, ctx()).unwrap();

        let summary = importer
            .run_with(&ImportPlan::only([ImportStage::Clear]), &sources, ctx())
            .unwrap();

        match &summary.stages[0].outcome {
            StageOutcome::Cleared { removed } => assert_eq!(removed[&RecordKind::Fighters], 2),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(summary.counts.values().all(|&n| n == 0));
    }

    #[test]
    fn test_clear_with_only_keeps_other_kinds() {
        let dir = write_extracts();
        let store = MemoryStore::new();
        let importer = Importer::new(&store, LoaderOptions::default());
        let sources = ExtractSources::in_dir(dir.path());
        importer.run_with(&ImportPlan::full(), &sources, ctx()).unwrap();

        let plan = ImportPlan::only([ImportStage::FightStats]).with_clear();
        assert_eq!(plan.cleared_kinds(), vec![RecordKind::FightStats]);
        let summary = importer.run_with(&plan, &sources, ctx()).unwrap();

        match &summary.stages[0].outcome {
            StageOutcome::Cleared { removed } => {
                assert_eq!(removed.len(), 1);
                assert_eq!(removed[&RecordKind::FightStats], 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(summary.counts[&RecordKind::Fighters], 2);
        assert_eq!(summary.counts[&RecordKind::Events], 2);
        assert_eq!(summary.counts[&RecordKind::FightStats], 2);
    }

    #[test]
    fn test_cleared_kinds() {
        assert_eq!(ImportPlan::full().with_clear().cleared_kinds(), RecordKind::ALL.to_vec());
        assert_eq!(ImportPlan::only([ImportStage::Clear]).cleared_kinds(), RecordKind::ALL.to_vec());
        assert_eq!(
            ImportPlan::only([ImportStage::Events, ImportStage::Fighters]).cleared_kinds(),
            vec![RecordKind::Fighters, RecordKind::Events]
        );
    }

    #[test]
    fn test_plan_building() {
        let plan = ImportPlan::only([ImportStage::FightStats, ImportStage::Fighters, ImportStage::FightStats]);
        assert_eq!(plan.stages(), &[ImportStage::Fighters, ImportStage::FightStats]);

        let plan = ImportPlan::full().with_clear().with_clear();
        assert_eq!(plan.stages().len(), 4);
        assert_eq!(plan.stages()[0], ImportStage::Clear);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ImportStage::from_name("Clear"), Some(ImportStage::Clear));
        assert_eq!(ImportStage::from_name("fight-stats"), Some(ImportStage::FightStats));
        assert_eq!(ImportStage::from_name("weigh-ins"), None);
    }

    #[test]
    fn test_report_serialization() {
        let report = StageReport {
            stage: ImportStage::FightStats,
            outcome: StageOutcome::Failed {
                message: "Extract is empty".to_string(),
                unreadable: false,
            },
            elapsed_ms: 3,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stage"], "fightstats");
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["message"], "Extract is empty");
        assert_eq!(json["elapsedMs"], 3);
    }
}
