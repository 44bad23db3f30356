//! REST API response types.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{FightMatchup, RecordKind};
use crate::parser::ParsedExtract;
use crate::transform::LoadSummary;

/// Response to an extract upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ok" when every row was imported, "warning" otherwise
    pub status: String,

    pub kind: RecordKind,

    pub summary: LoadSummary,

    pub csv_info: CsvMetadata,
}

impl ImportResponse {
    pub fn new(kind: RecordKind, summary: LoadSummary, csv_info: CsvMetadata) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: if summary.error_count == 0 { "ok" } else { "warning" }.to_string(),
            kind,
            summary,
            csv_info,
        }
    }
}

/// Uploaded extract metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub file_name: Option<String>,
    pub encoding: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl CsvMetadata {
    pub fn from_extract(extract: &ParsedExtract, file_name: Option<String>) -> Self {
        Self {
            file_name,
            encoding: extract.encoding.clone(),
            row_count: extract.row_count(),
            columns: extract.headers.clone(),
        }
    }
}

/// Reconstructed fights of one event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FightsResponse {
    pub event_id: String,
    pub count: usize,
    /// Fights with fewer than two fighters
    pub partial: usize,
    pub fights: Vec<FightMatchup>,
}

impl FightsResponse {
    pub fn new(event_id: impl Into<String>, fights: Vec<FightMatchup>) -> Self {
        Self {
            event_id: event_id.into(),
            count: fights.len(),
            partial: fights.iter().filter(|f| f.is_partial()).count(),
            fights,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}
