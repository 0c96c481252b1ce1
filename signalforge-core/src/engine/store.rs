//! Trade persistence.
//!
//! The on-disk form is one JSON document:
//! `{ "open": { "<trade id>": { ... } }, "history": [ ... ] }`.
//! Only the most recent `HISTORY_LIMIT` closed trades are written.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Trade, TradeId};

/// Closed trades kept in the persisted history.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trade store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("trade store at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize trade book: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("trade store unavailable: {0}")]
    Unavailable(String),
}

/// Snapshot of everything the monitor persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeBook {
    #[serde(default)]
    pub open: BTreeMap<TradeId, Trade>,
    #[serde(default)]
    pub history: Vec<Trade>,
}

impl TradeBook {
    /// Copy with the history cut to the last `HISTORY_LIMIT` entries.
    pub fn trimmed(&self) -> TradeBook {
        let skip = self.history.len().saturating_sub(HISTORY_LIMIT);
        TradeBook {
            open: self.open.clone(),
            history: self.history[skip..].to_vec(),
        }
    }
}

/// Durable storage for the trade book.
pub trait TradeStore: Send {
    /// Load the last saved book; an absent store is an empty book.
    fn load(&self) -> Result<TradeBook, StoreError>;

    /// Replace the stored book.
    fn save(&mut self, book: &TradeBook) -> Result<(), StoreError>;
}

/// JSON file store with atomic replace (write temp file, then rename).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TradeStore for JsonFileStore {
    fn load(&self) -> Result<TradeBook, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TradeBook::default()),
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&mut self, book: &TradeBook) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&book.trimmed())?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

/// In-memory store for backtests and tests. Can be switched into a failing
/// mode to exercise persistence-error handling.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    book: TradeBook,
    saves: usize,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_book(book: TradeBook) -> Self {
        Self {
            book,
            ..Self::default()
        }
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn book(&self) -> &TradeBook {
        &self.book
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl TradeStore for MemoryStore {
    fn load(&self) -> Result<TradeBook, StoreError> {
        if self.failing {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(self.book.clone())
    }

    fn save(&mut self, book: &TradeBook) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        self.book = book.trimmed();
        self.saves += 1;
        Ok(())
    }
}
