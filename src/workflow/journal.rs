//! Bookkeeping for blob-store side effects around a unit of work.
//!
//! The blob store has no transactions. Writes made while a unit of work is open are
//! journaled so they can be reverted if the unit of work does not commit; deletions
//! implied by database deletes are deferred into a [`Cleanup`] that runs only after
//! the commit succeeded.

use tracing::{error, warn};

use crate::storage::BlobStore;

#[derive(Debug, Clone, PartialEq, Eq)]
enum JournalEntry {
    Copied { to: String },
    Put { path: String },
    /// `path` was overwritten in place after its old bytes were copied to `backup`.
    Replaced { path: String, backup: String },
    /// `backup` holds the bytes `to` had before the move overwrote them.
    Moved { from: String, to: String, backup: Option<String> },
}

#[derive(Debug, Default)]
pub struct FileJournal {
    entries: Vec<JournalEntry>,
}

impl FileJournal {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn copied(&mut self, to: impl Into<String>) {
        self.entries.push(JournalEntry::Copied { to: to.into() });
    }

    pub(crate) fn put(&mut self, path: impl Into<String>) {
        self.entries.push(JournalEntry::Put { path: path.into() });
    }

    pub(crate) fn replaced(&mut self, path: impl Into<String>, backup: impl Into<String>) {
        self.entries.push(JournalEntry::Replaced { path: path.into(), backup: backup.into() });
    }

    pub(crate) fn moved(&mut self, from: impl Into<String>, to: impl Into<String>, backup: Option<String>) {
        self.entries.push(JournalEntry::Moved { from: from.into(), to: to.into(), backup });
    }

    /// Undoes the journaled changes newest-first. Returns how many could not be undone.
    pub async fn revert(self, blobs: &dyn BlobStore) -> usize {
        let mut failures = 0;
        for entry in self.entries.into_iter().rev() {
            let res = match &entry {
                JournalEntry::Copied { to } | JournalEntry::Put { path: to } => blobs.delete(to).await,
                JournalEntry::Replaced { path, backup } => blobs.move_to(backup, path).await,
                JournalEntry::Moved { from, to, backup } => match blobs.move_to(to, from).await {
                    Ok(()) => match backup {
                        Some(b) => blobs.move_to(b, to).await,
                        None => Ok(()),
                    },
                    Err(e) => Err(e),
                },
            };
            if let Err(e) = res {
                failures += 1;
                error!(?entry, "could not revert blob change: {e}");
            }
        }
        failures
    }
}

/// Blob deletions owed by a committed unit of work.
#[must_use = "cleanup does nothing until `run` is called after commit"]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cleanup {
    files: Vec<String>,
    directories: Vec<String>,
}

impl Cleanup {
    pub fn delete_file(&mut self, path: impl Into<String>) {
        self.files.push(path.into());
    }

    pub fn delete_directory(&mut self, prefix: impl Into<String>) {
        self.directories.push(prefix.into());
    }

    pub fn absorb(&mut self, other: Cleanup) {
        self.files.extend(other.files);
        self.directories.extend(other.directories);
    }

    /// Files first, then directories. Failures leave orphaned blobs and are only logged.
    pub async fn run(self, blobs: &dyn BlobStore) -> usize {
        let mut failures = 0;
        for path in &self.files {
            if let Err(e) = blobs.delete(path).await {
                failures += 1;
                warn!(%path, "orphaned blob after cleanup failure: {e}");
            }
        }
        for prefix in &self.directories {
            if let Err(e) = blobs.delete_directory(prefix).await {
                failures += 1;
                warn!(%prefix, "orphaned blob directory after cleanup failure: {e}");
            }
        }
        failures
    }
}
