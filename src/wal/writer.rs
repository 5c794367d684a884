//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{Result, VbaError};

use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    /// Length of the file up to the last fully written entry
    file_len: u64,
    /// LSN the next appended entry receives
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    uncommitted: usize,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// Appends continue after the last valid entry; LSNs resume from there.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let state = WalRecovery::verify(path)?;
        if state.was_truncated {
            return Err(VbaError::WalCorruption(format!(
                "{} has a damaged tail; run recovery before appending",
                path.display()
            )));
        }

        let file_len = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            file_len,
            current_lsn: state.last_lsn + 1,
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Append an operation, syncing according to the configured strategy
    ///
    /// Returns the LSN assigned to the entry. If the sync fails the entry is
    /// cut from the file again, so an `Err` never leaves a replayable record.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        self.append_entry(operation, false)
    }

    /// Append an operation and fsync before returning
    pub fn append_sync(&mut self, operation: Operation) -> Result<u64> {
        self.append_entry(operation, true)
    }

    fn append_entry(&mut self, operation: Operation, force_sync: bool) -> Result<u64> {
        let entry_start = self.file_len;
        let lsn = self.write_entry(operation)?;

        let should_sync = force_sync
            || match self.sync_strategy {
                WalSyncStrategy::EveryWrite => true,
                WalSyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
            };
        if should_sync {
            if let Err(e) = self.sync() {
                self.discard_entry(entry_start, lsn);
                return Err(e);
            }
        }

        Ok(lsn)
    }

    /// Cut the file back to `entry_start` and hand `lsn` out again
    fn discard_entry(&mut self, entry_start: u64, lsn: u64) {
        if let Err(cut) = self.file.set_len(entry_start) {
            tracing::warn!(
                "failed to remove unsynced WAL entry {} from {}: {}",
                lsn,
                self.path.display(),
                cut
            );
        }
        if let Err(seek) = self.file.seek(SeekFrom::Start(entry_start)) {
            tracing::warn!("failed to reposition WAL {}: {}", self.path.display(), seek);
        }
        self.file_len = entry_start;
        self.current_lsn = lsn;
        self.uncommitted = self.uncommitted.saturating_sub(1);
    }

    fn write_entry(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn;
        let bytes = WalEntry::new(lsn, operation).serialize()?;

        if let Err(e) = self.file.write_all(&bytes) {
            // Drop the torn bytes so later appends stay readable
            if let Err(cut) = self.file.set_len(self.file_len) {
                tracing::warn!("failed to cut torn WAL tail in {}: {}", self.path.display(), cut);
            }
            // The cursor may sit anywhere after a partial write
            if let Err(seek) = self.file.seek(SeekFrom::Start(self.file_len)) {
                tracing::warn!("failed to reposition WAL {}: {}", self.path.display(), seek);
            }
            return Err(VbaError::WalWrite(format!("LSN {}: {}", lsn, e)));
        }

        self.file_len += bytes.len() as u64;
        self.current_lsn += 1;
        self.uncommitted += 1;
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard every entry (after their effects are durable elsewhere)
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.file_len = 0;
        self.current_lsn = 1;
        self.uncommitted = 0;
        Ok(())
    }

    /// Get the LSN the next entry will receive
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Entries written but not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Current file size in bytes
    pub fn size(&self) -> u64 {
        self.file_len
    }
}
