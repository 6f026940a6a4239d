// src/archive.rs
// Durable record of finished rounds and the leaderboard built from it.

use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defs::{MAX_LOGIN_LENGTH, MIN_LOGIN_LENGTH};
use crate::error::ArchiveError;

/// One archived round result. Written once, read many times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub login: String,
    pub end_time: DateTime<Utc>,
    pub moves_done: u32,
    pub elapsed_seconds: u64,
}

impl ResultEntry {
    pub fn new(login: &str, end_time: DateTime<Utc>, moves_done: u32, elapsed_seconds: u64) -> Self {
        Self {
            login: login.to_string(),
            end_time,
            moves_done,
            elapsed_seconds,
        }
    }

    /// Check the entry against the archive's field limits
    pub fn validate(&self) -> Result<(), ArchiveError> {
        let length = self.login.chars().count();
        if !(MIN_LOGIN_LENGTH..=MAX_LOGIN_LENGTH).contains(&length) {
            return Err(ArchiveError::InvalidEntry(format!(
                "login length {length} outside {MIN_LOGIN_LENGTH}..={MAX_LOGIN_LENGTH}"
            )));
        }
        if self.login.chars().any(char::is_control) {
            return Err(ArchiveError::InvalidEntry("login contains control characters".to_string()));
        }
        if i64::try_from(self.elapsed_seconds).is_err() {
            return Err(ArchiveError::InvalidEntry(format!(
                "elapsed seconds {} out of range",
                self.elapsed_seconds
            )));
        }
        Ok(())
    }
}

/// Leaderboard order: more moves first, then shorter rounds, then most recent
pub fn leaderboard_order(a: &ResultEntry, b: &ResultEntry) -> Ordering {
    b.moves_done
        .cmp(&a.moves_done)
        .then(a.elapsed_seconds.cmp(&b.elapsed_seconds))
        .then(b.end_time.cmp(&a.end_time))
}

fn best_of(mut entries: Vec<ResultEntry>, n: usize) -> Vec<ResultEntry> {
    entries.sort_by(leaderboard_order);
    entries.truncate(n);
    entries
}

/// Storage the server archives round results into
pub trait ResultArchive: Send + Sync {
    fn record_result(&self, entry: &ResultEntry) -> Result<(), ArchiveError>;

    /// Best `n` entries in leaderboard order
    fn top_results(&self, n: usize) -> Result<Vec<ResultEntry>, ArchiveError>;
}

/// Archive kept in process memory; used when persistence is not wanted and in tests
#[derive(Default)]
pub struct MemoryArchive {
    entries: Mutex<Vec<ResultEntry>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<ResultEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultArchive for MemoryArchive {
    fn record_result(&self, entry: &ResultEntry) -> Result<(), ArchiveError> {
        entry.validate()?;
        self.entries().push(entry.clone());
        Ok(())
    }

    fn top_results(&self, n: usize) -> Result<Vec<ResultEntry>, ArchiveError> {
        let entries = self.entries().clone();
        for entry in &entries {
            entry.validate()?;
        }
        Ok(best_of(entries, n))
    }
}

/// Archive persisted as a JSON array in a single file
pub struct JsonFileArchive {
    path: PathBuf,
    // serializes read-modify-write cycles on the file
    guard: Mutex<()>,
}

impl JsonFileArchive {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory and check the existing file, if any, parses
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let archive = Self::new(path);
        if let Some(parent) = archive.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        archive.load()?;
        Ok(archive)
    }

    fn load(&self) -> Result<Vec<ResultEntry>, ArchiveError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, entries: &[ResultEntry]) -> Result<(), ArchiveError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        // write aside and rename so a crash never leaves a half-written archive
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl ResultArchive for JsonFileArchive {
    fn record_result(&self, entry: &ResultEntry) -> Result<(), ArchiveError> {
        entry.validate()?;
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        entries.push(entry.clone());
        self.store(&entries)
    }

    fn top_results(&self, n: usize) -> Result<Vec<ResultEntry>, ArchiveError> {
        let entries = {
            let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
            self.load()?
        };
        for entry in &entries {
            entry.validate()?;
        }
        Ok(best_of(entries, n))
    }
}
