//! Single-writer WAL append path: sequencing, rotation, and the
//! fail-fast-unhealthy contract.

use super::header::{compute_checksum, WalEntryType, WalHeader};
use common::constants::WAL_HEADER_SIZE;
use common::types::Ts;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors surfaced to the order store by the WAL.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal unavailable: {0}")]
    Unavailable(String),
    #[error("wal io error: {0}")]
    Io(String),
}

/// Tunables for a [`WalWriter`], matching `common::config::WalConfig`.
#[derive(Debug, Clone, Copy)]
pub struct WalWriterConfig {
    pub max_file_size_bytes: u64,
    pub max_files: usize,
    pub checkpoint_interval: u64,
    pub sync_on_write: bool,
}

impl Default for WalWriterConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: common::constants::DEFAULT_WAL_MAX_FILE_SIZE,
            max_files: common::constants::DEFAULT_WAL_MAX_FILES,
            checkpoint_interval: common::constants::DEFAULT_WAL_CHECKPOINT_INTERVAL,
            sync_on_write: true,
        }
    }
}

/// Appends framed entries to the active WAL file, rotating and sweeping old
/// files as needed. Not thread-safe by itself — callers serialize access
/// with a single lock covering sequence assignment plus append.
pub struct WalWriter {
    dir: PathBuf,
    prefix: String,
    cfg: WalWriterConfig,
    file: File,
    bytes_in_file: u64,
    next_seq: u64,
    entries_since_checkpoint: u64,
    healthy: bool,
}

impl WalWriter {
    /// Name of the WAL file starting at `start_seq`.
    #[must_use]
    pub fn file_name(prefix: &str, start_seq: u64) -> String {
        format!("{prefix}-{start_seq}.wal")
    }

    fn current_symlink_path(dir: &Path, prefix: &str) -> PathBuf {
        dir.join(format!("{prefix}.current"))
    }

    /// Create a brand-new WAL in `dir`, starting sequence numbering at 0.
    pub fn create(dir: &Path, prefix: &str, cfg: WalWriterConfig) -> Result<Self, WalError> {
        fs::create_dir_all(dir).map_err(|e| WalError::Io(e.to_string()))?;
        let path = dir.join(Self::file_name(prefix, 0));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WalError::Io(e.to_string()))?;
        let mut writer = Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            cfg,
            file,
            bytes_in_file: 0,
            next_seq: 0,
            entries_since_checkpoint: 0,
            healthy: true,
        };
        writer.write_banner()?;
        writer.update_current_symlink(&path)?;
        Ok(writer)
    }

    /// Resume appending to an existing WAL: opens (creating if absent) the
    /// file starting at `current_file_start_seq` for append, and continues
    /// sequence numbering from `next_seq`. The caller determines both via
    /// [`super::replay_directory`].
    pub fn resume(
        dir: &Path,
        prefix: &str,
        cfg: WalWriterConfig,
        next_seq: u64,
        current_file_start_seq: u64,
    ) -> Result<Self, WalError> {
        fs::create_dir_all(dir).map_err(|e| WalError::Io(e.to_string()))?;
        let path = dir.join(Self::file_name(prefix, current_file_start_seq));
        let bytes_in_file = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WalError::Io(e.to_string()))?;
        let mut writer = Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            cfg,
            file,
            bytes_in_file,
            next_seq,
            entries_since_checkpoint: 0,
            healthy: true,
        };
        writer.update_current_symlink(&path)?;
        Ok(writer)
    }

    fn update_current_symlink(&mut self, target: &Path) -> Result<(), WalError> {
        let link = Self::current_symlink_path(&self.dir, &self.prefix);
        let _ = fs::remove_file(&link);
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, &link).map_err(|e| WalError::Io(e.to_string()))?;
        }
        #[cfg(not(unix))]
        {
            fs::write(&link, target.to_string_lossy().as_bytes())
                .map_err(|e| WalError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Write the format banner that must open every file (spec §6). Counts
    /// against the sequence space like any other entry; `WalReader` skips
    /// it transparently so callers never see it.
    fn write_banner(&mut self) -> Result<(), WalError> {
        self.write_entry(WalEntryType::FormatBanner, &[], Ts::now().as_nanos())
            .map(|_| ())
            .map_err(|e| WalError::Io(e.to_string()))
    }

    fn write_entry(
        &mut self,
        entry_type: WalEntryType,
        payload: &[u8],
        ts_ns: u64,
    ) -> std::io::Result<u64> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let checksum = compute_checksum(entry_type, seq, ts_ns, payload);
        let header = WalHeader {
            magic: common::constants::WAL_MAGIC,
            version: common::constants::WAL_VERSION,
            entry_type: entry_type as u8,
            sequence: seq,
            ts_ns,
            payload_size: payload.len() as u32,
            checksum,
        };
        self.file.write_all(&header.to_bytes())?;
        self.file.write_all(payload)?;
        if self.cfg.sync_on_write {
            self.file.sync_data()?;
        }
        self.bytes_in_file += (WAL_HEADER_SIZE + payload.len()) as u64;
        Ok(seq)
    }

    /// Append a framed entry, returning its assigned sequence number.
    /// Fails fast with [`WalError::Unavailable`] once a prior write has
    /// failed.
    pub fn append(
        &mut self,
        entry_type: WalEntryType,
        payload: &[u8],
        ts_ns: u64,
    ) -> Result<u64, WalError> {
        if !self.healthy {
            return Err(WalError::Unavailable(
                "a previous write failed; halt trading or restart the WAL".to_string(),
            ));
        }

        let seq = match self.write_entry(entry_type, payload, ts_ns) {
            Ok(seq) => seq,
            Err(e) => {
                self.healthy = false;
                error!(error = %e, "wal write failed, marking unavailable");
                return Err(WalError::Io(e.to_string()));
            }
        };

        if !matches!(entry_type, WalEntryType::Rotation) {
            self.entries_since_checkpoint += 1;
        }

        if self.bytes_in_file >= self.cfg.max_file_size_bytes
            && !matches!(entry_type, WalEntryType::Rotation)
        {
            if let Err(e) = self.rotate(ts_ns) {
                self.healthy = false;
                return Err(e);
            }
        }

        Ok(seq)
    }

    pub fn log_order_new(&mut self, payload: &[u8], ts_ns: u64) -> Result<u64, WalError> {
        self.append(WalEntryType::OrderNew, payload, ts_ns)
    }

    pub fn log_order_update(&mut self, payload: &[u8], ts_ns: u64) -> Result<u64, WalError> {
        self.append(WalEntryType::OrderUpdate, payload, ts_ns)
    }

    pub fn log_order_fill(&mut self, payload: &[u8], ts_ns: u64) -> Result<u64, WalError> {
        self.append(WalEntryType::OrderFill, payload, ts_ns)
    }

    pub fn log_order_cancel(&mut self, payload: &[u8], ts_ns: u64) -> Result<u64, WalError> {
        self.append(WalEntryType::OrderCancel, payload, ts_ns)
    }

    /// Write a checkpoint entry (a full snapshot of the store) and reset
    /// the checkpoint-interval counter.
    pub fn checkpoint(&mut self, payload: &[u8], ts_ns: u64) -> Result<u64, WalError> {
        let seq = self.append(WalEntryType::Checkpoint, payload, ts_ns)?;
        self.entries_since_checkpoint = 0;
        Ok(seq)
    }

    /// `true` once `checkpoint_interval` entries have been appended since
    /// the last checkpoint.
    #[must_use]
    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.cfg.checkpoint_interval
    }

    /// `true` unless a write has failed; once `false`, every `log_*` call
    /// returns [`WalError::Unavailable`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn rotate(&mut self, ts_ns: u64) -> Result<(), WalError> {
        self.write_entry(WalEntryType::Rotation, &[], ts_ns)
            .map_err(|e| WalError::Io(e.to_string()))?;
        self.file.flush().map_err(|e| WalError::Io(e.to_string()))?;

        let start_seq = self.next_seq;
        let path = self.dir.join(Self::file_name(&self.prefix, start_seq));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WalError::Io(e.to_string()))?;
        self.file = file;
        self.bytes_in_file = 0;
        self.write_banner()?;
        self.update_current_symlink(&path)?;
        self.enforce_max_files()?;
        info!(start_seq, "wal rotated");
        Ok(())
    }

    fn enforce_max_files(&self) -> Result<(), WalError> {
        let mut files: Vec<(u64, PathBuf)> = fs::read_dir(&self.dir)
            .map_err(|e| WalError::Io(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let start_seq = name
                    .strip_prefix(&format!("{}-", self.prefix))?
                    .strip_suffix(".wal")?
                    .parse::<u64>()
                    .ok()?;
                Some((start_seq, entry.path()))
            })
            .collect();
        files.sort_by_key(|(seq, _)| *seq);

        if files.len() > self.cfg.max_files {
            let excess = files.len() - self.cfg.max_files;
            for (seq, path) in files.into_iter().take(excess) {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(start_seq = seq, error = %e, "failed to prune old wal file");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sequence_is_monotonic_across_calls() {
        let dir = tempdir().unwrap();
        let mut wal = WalWriter::create(dir.path(), "test", WalWriterConfig::default()).unwrap();
        // seq 0 is the format banner written by `create`; real entries start at 1.
        let s1 = wal.log_order_new(b"a", 1).unwrap();
        let s2 = wal.log_order_new(b"b", 2).unwrap();
        let s3 = wal.log_order_new(b"c", 3).unwrap();
        assert_eq!((s1, s2, s3), (1, 2, 3));
    }

    #[test]
    fn every_new_file_begins_with_a_format_banner() {
        let dir = tempdir().unwrap();
        let mut wal = WalWriter::create(dir.path(), "test", WalWriterConfig::default()).unwrap();
        wal.log_order_new(b"a", 1).unwrap();

        let bytes = fs::read(dir.path().join("test-0.wal")).unwrap();
        let header = super::super::header::WalHeader::from_bytes(&bytes[..WAL_HEADER_SIZE]).unwrap();
        assert_eq!(header.entry_type, WalEntryType::FormatBanner as u8);
    }

    #[test]
    fn rotation_creates_a_new_file_and_symlink() {
        let dir = tempdir().unwrap();
        let cfg = WalWriterConfig {
            max_file_size_bytes: 1,
            ..WalWriterConfig::default()
        };
        let mut wal = WalWriter::create(dir.path(), "test", cfg).unwrap();
        wal.log_order_new(b"payload", 1).unwrap();
        wal.log_order_new(b"payload2", 2).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        let wal_files = entries
            .iter()
            .filter_map(|e| e.as_ref().ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".wal"))
            .count();
        assert!(wal_files >= 2);
        assert!(dir.path().join("test.current").exists());
    }

    #[test]
    fn needs_checkpoint_after_interval_entries() {
        let dir = tempdir().unwrap();
        let cfg = WalWriterConfig {
            checkpoint_interval: 2,
            ..WalWriterConfig::default()
        };
        let mut wal = WalWriter::create(dir.path(), "test", cfg).unwrap();
        assert!(!wal.needs_checkpoint());
        wal.log_order_new(b"a", 1).unwrap();
        wal.log_order_new(b"b", 2).unwrap();
        assert!(wal.needs_checkpoint());
        wal.checkpoint(b"snapshot", 3).unwrap();
        assert!(!wal.needs_checkpoint());
    }
}
