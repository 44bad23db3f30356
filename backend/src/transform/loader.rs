//! Natural-key upsert loader.
//!
//! Drains one extract into the store. Each row is normalized, checked for a
//! non-empty identity and upserted under its natural key; a failing row is
//! counted and the batch moves on. Counters are folded into the returned
//! [`LoadSummary`].

use serde::{Deserialize, Serialize};

use super::rows::{FromExtract, ImportContext};
use crate::api::logs::{log_error_indent, log_info_indent};
use crate::error::{ExtractError, RowError};
use crate::models::RecordKind;
use crate::parser::{MalformedRow, ParsedExtract, RawRecord};
use crate::store::{upsert_record, RecordStore, UpsertOutcome};

/// How many row errors are logged individually before going quiet.
pub const DEFAULT_ERROR_LOG_LIMIT: usize = 5;

/// Counters for one loader invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub imported_count: usize,
    pub error_count: usize,
    /// Part of `error_count` dropped by the assembler for a wrong field count.
    pub malformed_rows: usize,
    pub created: usize,
    pub replaced: usize,
}

impl LoadSummary {
    fn with_imported(mut self, outcome: UpsertOutcome) -> Self {
        self.imported_count += 1;
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Replaced => self.replaced += 1,
        }
        self
    }

    fn with_error(mut self, err: &RowError) -> Self {
        self.error_count += 1;
        if matches!(err, RowError::Malformed { .. }) {
            self.malformed_rows += 1;
        }
        self
    }

    /// Rows seen, imported or not.
    pub fn total_rows(&self) -> usize {
        self.imported_count + self.error_count
    }
}

/// Loader tuning.
#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    /// Row errors logged individually; later ones are only counted.
    pub error_log_limit: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            error_log_limit: DEFAULT_ERROR_LOG_LIMIT,
        }
    }
}

/// Progress is logged every this many imported rows.
pub fn progress_interval(kind: RecordKind) -> Option<usize> {
    match kind {
        RecordKind::Fighters => Some(500),
        RecordKind::Events => None,
        RecordKind::FightStats => Some(2000),
    }
}

/// Fail when the header lacks a natural-key column.
pub fn check_key_columns(kind: RecordKind, extract: &ParsedExtract) -> Result<(), ExtractError> {
    match kind.key_columns().iter().copied().find(|c| !extract.has_column(c)) {
        Some(column) => Err(ExtractError::MissingKeyColumn {
            kind,
            column: column.to_string(),
        }),
        None => Ok(()),
    }
}

enum Row<'a> {
    Record(&'a RawRecord),
    Malformed(MalformedRow),
}

impl Row<'_> {
    fn line(&self) -> usize {
        match self {
            Row::Record(raw) => raw.line(),
            Row::Malformed(m) => m.line,
        }
    }
}

/// Import one row. The record is normalized, its identity checked, then
/// upserted.
fn import_row<T, S>(store: &S, raw: &RawRecord, ctx: &ImportContext) -> Result<UpsertOutcome, RowError>
where
    T: FromExtract,
    S: RecordStore + ?Sized,
{
    let record = T::from_raw(raw, ctx);
    if let Some(field) = record.natural_key().first_empty_field() {
        return Err(RowError::MissingIdentity {
            line: raw.line(),
            field: field.to_string(),
        });
    }
    upsert_record(store, &record).map_err(|source| RowError::Persistence {
        line: raw.line(),
        source,
    })
}

/// Load every row of `extract` as `T`.
///
/// Only a missing key column stops the load; everything else is a row error.
pub fn load_extract<T, S>(
    store: &S,
    extract: &ParsedExtract,
    ctx: &ImportContext,
    options: &LoaderOptions,
) -> Result<LoadSummary, ExtractError>
where
    T: FromExtract,
    S: RecordStore + ?Sized,
{
    check_key_columns(T::KIND, extract)?;

    // Malformed rows are reported in file order with the others
    let mut rows: Vec<Row> = extract
        .records
        .iter()
        .map(Row::Record)
        .chain(extract.malformed.iter().copied().map(Row::Malformed))
        .collect();
    rows.sort_by_key(|row| row.line());

    let every = progress_interval(T::KIND);
    let total = rows.len();

    let summary = rows.iter().fold(LoadSummary::default(), |summary, row| {
        let result = match row {
            Row::Record(raw) => import_row::<T, S>(store, raw, ctx),
            Row::Malformed(m) => Err(RowError::from(*m)),
        };
        match result {
            Ok(outcome) => {
                let summary = summary.with_imported(outcome);
                if every.is_some_and(|n| summary.imported_count % n == 0) {
                    log_info_indent(
                        format!("Imported {}/{} {}...", summary.imported_count, total, T::KIND),
                        1,
                    );
                }
                summary
            }
            Err(err) => {
                let summary = summary.with_error(&err);
                if summary.error_count <= options.error_log_limit {
                    log_error_indent(format!("Error importing {}: {}", T::KIND, err), 1);
                }
                summary
            }
        }
    });

    Ok(summary)
}
