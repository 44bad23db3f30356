//! JSON file store - one document per file.
//!
//! Layout: `<root>/<kind>/<encoded key>.json`. The whole store is loaded into
//! memory on open; writes go to disk first (temp file + rename), then to the
//! in-memory index.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{stamp_key, Filter, MemoryStore, NaturalKey, RecordStore, SortKey, UpsertOutcome};
use crate::api::logs::log_warning;
use crate::error::{StoreError, StoreResult};
use crate::models::RecordKind;

/// Directory where documents are stored (relative to current dir)
pub const DEFAULT_STORE_DIR: &str = ".octagon/store";

/// Longest encoded key that still fits a file name with its extension.
const MAX_FILE_STEM: usize = 240;

/// Store backed by JSON files.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    index: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `root` and load every
    /// document.
    ///
    /// Fails with [`StoreError::Unreachable`] when the directories cannot be
    /// created or read.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let store = Self {
            root,
            index: MemoryStore::new(),
            write_lock: Mutex::new(()),
        };

        for kind in RecordKind::ALL {
            let dir = store.kind_dir(kind);
            fs::create_dir_all(&dir).map_err(|e| StoreError::Unreachable {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
            store.load_kind(kind)?;
        }

        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: RecordKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    fn document_path(&self, kind: RecordKind, identity: &str) -> StoreResult<PathBuf> {
        let stem = encode_key(identity);
        if stem.len() > MAX_FILE_STEM {
            return Err(StoreError::InvalidKey {
                kind,
                message: format!("key too long ({} bytes encoded)", stem.len()),
            });
        }
        Ok(self.kind_dir(kind).join(format!("{}.json", stem)))
    }

    /// Load all documents of a kind. Unparsable files are skipped.
    fn load_kind(&self, kind: RecordKind) -> StoreResult<()> {
        let dir = self.kind_dir(kind);
        let entries = fs::read_dir(&dir).map_err(|e| StoreError::Unreachable {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            let identity = match path.file_stem().and_then(|s| s.to_str()).and_then(decode_key) {
                Some(id) => id,
                None => {
                    log_warning(format!("Skipping unrecognized file {}", path.display()));
                    continue;
                }
            };
            let parsed = fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|content| serde_json::from_str::<Value>(&content).map_err(StoreError::from));
            match parsed {
                Ok(doc) => {
                    self.index.put(kind, identity, doc)?;
                }
                Err(e) => log_warning(format!("Skipping unreadable document {}: {}", path.display(), e)),
            }
        }
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn upsert_by_key(&self, kind: RecordKind, key: &NaturalKey, doc: Value) -> StoreResult<UpsertOutcome> {
        key.check(kind)?;
        let identity = key.identity();
        let path = self.document_path(kind, &identity)?;
        let doc = stamp_key(key, doc);

        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&doc)?)?;
        fs::rename(&tmp, &path)?;

        self.index.put(kind, identity, doc)
    }

    fn find_by_filter(
        &self,
        kind: RecordKind,
        filter: &Filter,
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>> {
        self.index.find_by_filter(kind, filter, sort, limit)
    }

    fn clear(&self, kind: RecordKind) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        for entry in fs::read_dir(self.kind_dir(kind))?.flatten() {
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path)?;
            }
        }
        self.index.clear(kind)
    }

    fn count(&self, kind: RecordKind) -> StoreResult<usize> {
        self.index.count(kind)
    }
}

/// Encode a key as a file stem: `[a-z0-9_-]` pass through, every other byte
/// becomes `%XX`. Keeping names lowercase avoids collisions on
/// case-insensitive filesystems.
fn encode_key(identity: &str) -> String {
    let mut out = String::with_capacity(identity.len());
    for b in identity.bytes() {
        match b {
            b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn decode_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
