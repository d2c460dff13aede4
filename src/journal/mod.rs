//! Append-only command log.
//!
//! One file per user-initiated action, named by a zero-padded millisecond
//! timestamp plus a random suffix so lexicographic directory order is
//! chronological replay order. The log is the system of record: the
//! entire index can be reconstructed by replaying it.

use crate::models::Command;
use crate::{Error, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Per-process append counter. Appends within the same microsecond
/// still sort in append order.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// The file-per-event journal for one scope.
#[derive(Debug, Clone)]
pub struct CommandLog {
    path: PathBuf,
}

impl CommandLog {
    /// Creates a log rooted at `path`. The directory is created on first
    /// append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends a new journal entry.
    ///
    /// The filename is a microsecond timestamp, a per-process sequence
    /// number and a random suffix, in that order, so lexicographic
    /// directory order equals append order even for appends landing in
    /// the same timestamp tick. The random suffix keeps names unique
    /// across processes.
    pub fn log(&self, command: &Command) -> Result<()> {
        fs::create_dir_all(&self.path).map_err(|e| Error::op("create_journal_dir", e))?;
        let filename = format!(
            "{:016}-{:010}-{}.json",
            chrono::Utc::now().timestamp_micros(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed),
            uuid::Uuid::new_v4().simple()
        );
        let body = serde_json::to_vec(command).map_err(|e| Error::op("serialize_command", e))?;
        let target = self.path.join(&filename);
        tracing::debug!(
            action = ?command.action,
            url = %command.payload.url,
            file = %target.display(),
            "logging command"
        );
        fs::write(&target, body).map_err(|e| Error::op("write_journal_entry", e))
    }

    /// Replays journal entries in chronological order.
    ///
    /// Each parsed command gets its filename assigned as `command_id`.
    /// A parse or callback failure for one entry is logged and skipped;
    /// replay of subsequent entries continues.
    pub fn replay(&self, mut callback: impl FnMut(Command) -> Result<()>) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut filenames: Vec<String> = fs::read_dir(&self.path)
            .map_err(|e| Error::op("read_journal_dir", e))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json"))
            .collect();
        // Timestamp-prefixed names sort chronologically.
        filenames.sort();

        for filename in filenames {
            let entry = self.path.join(&filename);
            let command = fs::read(&entry)
                .map_err(|e| Error::op("read_journal_entry", e))
                .and_then(|bytes| {
                    serde_json::from_slice::<Command>(&bytes)
                        .map_err(|e| Error::op("parse_journal_entry", e))
                });
            let mut command = match command {
                Ok(command) => command,
                Err(e) => {
                    tracing::warn!(file = %filename, error = %e, "skipping bad journal entry");
                    continue;
                }
            };
            command.command_id = Some(filename.clone());
            if let Err(e) = callback(command) {
                tracing::warn!(file = %filename, error = %e, "replay callback failed, continuing");
            }
        }
        Ok(())
    }

    /// Removes every command whose payload url equals `target`.
    ///
    /// There is no index by url; this is a full scan over the log.
    pub fn remove_by_url(&self, target: &Url) -> Result<()> {
        let mut failure = None;
        self.replay(|command| {
            if command.payload.url == *target {
                if let Err(e) = self.remove(&command) {
                    failure = Some(e);
                }
            }
            Ok(())
        })?;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Deletes one journal entry by its `command_id`.
    ///
    /// A command without a `command_id` was never read back from storage;
    /// asking to remove it is a programming error and fails loudly.
    pub fn remove(&self, command: &Command) -> Result<()> {
        let Some(command_id) = &command.command_id else {
            return Err(Error::NotFound(
                "cannot remove logged command without a commandId".to_string(),
            ));
        };
        // Filenames are flat; anything else never came from this log.
        if command_id.contains('/') || command_id.contains("..") {
            return Err(Error::InvalidInput(format!(
                "suspicious commandId: {command_id}"
            )));
        }
        let target = self.path.join(command_id);
        tracing::debug!(file = %target.display(), "removing journal entry");
        fs::remove_file(&target).map_err(|e| Error::op("remove_journal_entry", e))
    }
}
