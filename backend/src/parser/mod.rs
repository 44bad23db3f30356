//! Extract reading: encoding detection, tokenizing and record assembly.
//!
//! This is the only place where rows exist as untyped header→value maps.
//! Everything downstream works on the typed rows from
//! [`crate::transform::rows`].

pub mod tokenizer;

use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use crate::error::{ExtractError, ExtractResult, RowError};
pub use tokenizer::tokenize;

/// One data row zipped with the header, in source column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    line: usize,
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl RawRecord {
    /// 1-based line number in the extract.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Value of a column, `None` if the header lacks it. A repeated column
    /// reads as its last occurrence.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.headers
            .iter()
            .rposition(|h| h == field)
            .map(|i| self.values[i].as_str())
    }

    /// Value of a column, empty if the header lacks it.
    pub fn value(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    /// Iterate `(header, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// Row as a JSON object, for debugging output.
    pub fn to_json(&self) -> Value {
        let obj: Map<String, Value> = self
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        Value::Object(obj)
    }
}

/// A row dropped because its token count differs from the header's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedRow {
    pub line: usize,
    pub expected: usize,
    pub found: usize,
}

impl From<MalformedRow> for RowError {
    fn from(row: MalformedRow) -> Self {
        RowError::Malformed {
            line: row.line,
            expected: row.expected,
            found: row.found,
        }
    }
}

/// Result of reading an extract.
#[derive(Debug, Clone)]
pub struct ParsedExtract {
    /// Column headers
    pub headers: Vec<String>,
    /// Well-formed rows, in source order
    pub records: Vec<RawRecord>,
    /// Rows dropped for a token count mismatch
    pub malformed: Vec<MalformedRow>,
    /// Detected encoding
    pub encoding: String,
}

impl ParsedExtract {
    /// Data rows seen (well-formed + malformed).
    pub fn row_count(&self) -> usize {
        self.records.len() + self.malformed.len()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "iso-8859-15" | "latin-9" | "latin9" => "iso-8859-15".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes using the given encoding, falling back to lossy UTF-8.
///
/// Latin-1 goes through windows-1252, which agrees with it on every
/// printable byte.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        "iso-8859-15" | "latin-9" | "latin9" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Zip the header line with every following line.
///
/// Blank lines are ignored. Rows whose token count differs from the
/// header's are reported in [`ParsedExtract::malformed`] instead of failing
/// the extract.
pub fn assemble(content: &str, encoding: impl Into<String>) -> ExtractResult<ParsedExtract> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header_line) = lines.next().ok_or(ExtractError::Empty)?;
    let headers = tokenize(header_line);
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ExtractError::NoHeaders);
    }

    let shared: Arc<[String]> = headers.clone().into();
    let mut records = Vec::new();
    let mut malformed = Vec::new();

    for (line, text) in lines {
        let values = tokenize(text);
        if values.len() == shared.len() {
            records.push(RawRecord {
                line,
                headers: Arc::clone(&shared),
                values,
            });
        } else {
            malformed.push(MalformedRow {
                line,
                expected: shared.len(),
                found: values.len(),
            });
        }
    }

    Ok(ParsedExtract {
        headers,
        records,
        malformed,
        encoding: encoding.into(),
    })
}

/// Parse extract bytes with encoding auto-detection.
pub fn parse_bytes_auto(bytes: &[u8]) -> ExtractResult<ParsedExtract> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    assemble(&content, encoding)
}

/// Read and parse an extract file.
pub fn read_extract<P: AsRef<Path>>(path: P) -> ExtractResult<ParsedExtract> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_extract() {
        let content = "name,age\nAlice,30\nBob,25";
        let parsed = assemble(content, "utf-8").unwrap();

        assert_eq!(parsed.headers, vec!["name", "age"]);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].value("name"), "Alice");
        assert_eq!(parsed.records[0].value("age"), "30");
        assert_eq!(parsed.records[1].value("name"), "Bob");
    }

    #[test]
    fn test_quoted_values() {
        let content = "event_name,location\n\"UFC 300: Pereira vs. Hill\",\"Las Vegas, Nevada, USA\"";
        let parsed = assemble(content, "utf-8").unwrap();

        assert_eq!(parsed.records[0].value("event_name"), "UFC 300: Pereira vs. Hill");
        assert_eq!(parsed.records[0].value("location"), "Las Vegas, Nevada, USA");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let content = "a,b\n1,2\n\n3,4\n";
        let parsed = assemble(content, "utf-8").unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.malformed.is_empty());
        // Line numbers count the blank line
        assert_eq!(parsed.records[1].line(), 4);
    }

    #[test]
    fn test_wrong_token_count_dropped_not_fatal() {
        let content = "a,b,c\n1,2,3\n1,2\n4,5,6,7\n7,8,9";
        let parsed = assemble(content, "utf-8").unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(
            parsed.malformed,
            vec![
                MalformedRow { line: 3, expected: 3, found: 2 },
                MalformedRow { line: 4, expected: 3, found: 4 },
            ]
        );
        assert_eq!(parsed.row_count(), 4);
        assert_eq!(parsed.records[1].value("c"), "9");
    }

    #[test]
    fn test_crlf_and_bom() {
        let content = "\u{feff}a,b\r\n1,2\r\n";
        let parsed = assemble(content, "utf-8").unwrap();

        assert_eq!(parsed.headers, vec!["a", "b"]);
        assert_eq!(parsed.records[0].value("b"), "2");
    }

    #[test]
    fn test_missing_column_reads_empty() {
        let parsed = assemble("a\n1", "utf-8").unwrap();
        assert_eq!(parsed.records[0].get("zzz"), None);
        assert_eq!(parsed.records[0].value("zzz"), "");
        assert!(parsed.has_column("a"));
    }

    #[test]
    fn test_repeated_column_reads_last() {
        let parsed = assemble("url,name,name\nu1,A,B", "utf-8").unwrap();
        assert_eq!(parsed.records[0].value("name"), "B");
        assert_eq!(parsed.records[0].to_json()["name"], "B");
    }

    #[test]
    fn test_empty_extract_error() {
        assert!(matches!(assemble("", "utf-8"), Err(ExtractError::Empty)));
        assert!(matches!(assemble("\n  \n", "utf-8"), Err(ExtractError::Empty)));
    }

    #[test]
    fn test_blank_header_error() {
        assert!(matches!(assemble(",,\n1,2,3", "utf-8"), Err(ExtractError::NoHeaders)));
    }

    #[test]
    fn test_unreadable_file() {
        let err = read_extract("/nonexistent/octagon/fighters.csv").unwrap_err();
        assert!(err.is_unreadable());
    }

    #[test]
    fn test_to_json_keeps_headers() {
        let parsed = assemble("url,name\nu1,Jon", "utf-8").unwrap();
        let json = parsed.records[0].to_json();
        assert_eq!(json["url"], "u1");
        assert_eq!(json["name"], "Jon");
    }

    #[test]
    fn test_latin1_decoding() {
        // "José" in ISO-8859-1
        let bytes: &[u8] = &[0x4A, 0x6F, 0x73, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "José");
    }

    #[test]
    fn test_latin1_currency_and_diaeresis() {
        // ¤ ¦ ¨ in ISO-8859-1; latin-9 reads the same bytes as € Š š
        let bytes: &[u8] = &[0xA4, 0xA6, 0xA8];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "\u{a4}\u{a6}\u{a8}");
        assert_eq!(decode_content(bytes, "iso-8859-15"), "€Šš");
    }
}
