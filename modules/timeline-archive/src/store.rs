// Flat JSON persistence: one document per account, id -> attributes.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{Result, ScrapeError};
use crate::types::{PostId, PostRecord, PostRecords};

pub struct AccountStore {
    path: PathBuf,
    records: PostRecords,
}

impl AccountStore {
    /// `<out_dir>/<handle>.json`, handle lowercased.
    pub fn path_for(out_dir: &Path, handle: &str) -> PathBuf {
        out_dir.join(format!("{}.json", handle.to_lowercase()))
    }

    /// Read the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => PostRecords::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => PostRecords::new(),
            Err(source) => return Err(ScrapeError::Store { path, source }),
        };
        info!(path = %path.display(), existing = records.len(), "loaded account store");
        Ok(Self { path, records })
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        Self {
            path: PathBuf::from("in-memory.json"),
            records: PostRecords::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &PostId) -> Option<&PostRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> &PostRecords {
        &self.records
    }

    /// Add records for identifiers not yet stored. Stored records are never
    /// replaced. Returns how many were added.
    pub fn merge(&mut self, incoming: PostRecords) -> usize {
        let mut added = 0;
        for (id, record) in incoming {
            if let std::collections::btree_map::Entry::Vacant(slot) = self.records.entry(id) {
                slot.insert(record);
                added += 1;
            }
        }
        added
    }

    /// Write the whole store through a temp file in the same directory, then
    /// rename it over the old document.
    pub fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| self.io_error(source))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| self.io_error(source))?;
        {
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(tmp.as_file_mut(), formatter);
            self.records.serialize(&mut ser)?;
        }
        tmp.write_all(b"\n").map_err(|source| self.io_error(source))?;
        tmp.as_file()
            .sync_all()
            .map_err(|source| self.io_error(source))?;
        tmp.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;

        info!(path = %self.path.display(), stored = self.records.len(), "stored posts");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> ScrapeError {
        ScrapeError::Store {
            path: self.path.clone(),
            source,
        }
    }
}
