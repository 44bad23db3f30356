//! Quote-aware line tokenizer.
//!
//! A `"` toggles the inside-quotes state and is dropped from the field; a
//! comma splits fields only outside quotes. Doubled quotes (`""`) are not an
//! escape: they toggle twice and contribute nothing.

/// Field separator for all extracts.
pub const SEPARATOR: char = ',';

/// Split one line into trimmed fields.
///
/// Returns an empty vector for a blank line.
pub fn tokenize(line: &str) -> Vec<String> {
    if line.trim().is_empty() {
        return Vec::new();
    }

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            SEPARATOR if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}
