//! Portfolio persistence.
//!
//! A store keeps one JSON document per account. Dates inside the document
//! are ISO-8601 strings and are parsed back into `DateTime<Utc>` on load.

use crate::types::Portfolio;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Durable snapshot storage for a single portfolio.
pub trait PortfolioStore: Send + Sync {
    /// Load the stored portfolio, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<Portfolio>>;

    /// Replace the stored portfolio.
    fn save(&self, portfolio: &Portfolio) -> Result<()>;

    /// Forget the stored portfolio.
    fn clear(&self) -> Result<()>;
}

/// Stores the portfolio as a pretty-printed JSON file.
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
}

impl PortfolioStore for JsonFileStore {
    fn load(&self) -> Result<Option<Portfolio>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, portfolio: &Portfolio) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(portfolio)?;
        // Write-then-rename so a crash never leaves half a document behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Keeps the serialized document in memory.
///
/// Used by tests and by the CLI demo; writes can be made to fail to exercise
/// the ledger's commit path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The raw stored JSON, if any.
    pub fn document(&self) -> Option<String> {
        self.document.lock().ok().and_then(|doc| doc.clone())
    }
}

impl PortfolioStore for MemoryStore {
    fn load(&self) -> Result<Option<Portfolio>> {
        match self.document() {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    fn save(&self, portfolio: &Portfolio) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("storage unavailable")));
        }

        let content = serde_json::to_string(portfolio)?;
        let mut doc = self
            .document
            .lock()
            .map_err(|_| Error::InvalidOperation("memory store poisoned".to_string()))?;
        *doc = Some(content);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut doc = self
            .document
            .lock()
            .map_err(|_| Error::InvalidOperation("memory store poisoned".to_string()))?;
        *doc = None;
        Ok(())
    }
}
