//! Sequential reader over a single WAL file.

use super::header::{compute_checksum, WalEntryType, WalHeader};
use common::constants::WAL_HEADER_SIZE;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// A single successfully-decoded WAL entry.
#[derive(Debug, Clone)]
pub struct RawWalEntry {
    pub sequence: u64,
    pub ts_ns: u64,
    pub entry_type: WalEntryType,
    pub payload: Vec<u8>,
}

/// Why reading stopped before reaching end-of-file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptionReason {
    BadMagicOrVersion,
    ChecksumMismatch,
    TruncatedPayload,
    UnknownEntryType(u8),
}

/// Reads framed entries from one WAL file, stopping at the first corrupt
/// or truncated frame.
pub struct WalReader {
    file: File,
}

impl WalReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Read the next entry. `Ok(None)` means a clean end-of-file; `Err`
    /// means the file tail is corrupt or truncated and replay of this file
    /// must stop here. The format banner that opens every file is consumed
    /// internally and never returned.
    pub fn read_entry(&mut self) -> Result<Option<RawWalEntry>, CorruptionReason> {
        loop {
            match self.read_raw_entry()? {
                Some(entry) if entry.entry_type == WalEntryType::FormatBanner => continue,
                other => return Ok(other),
            }
        }
    }

    fn read_raw_entry(&mut self) -> Result<Option<RawWalEntry>, CorruptionReason> {
        let mut header_buf = [0u8; WAL_HEADER_SIZE];
        match read_exact_or_eof(&mut self.file, &mut header_buf) {
            ReadResult::Eof => return Ok(None),
            ReadResult::Truncated => return Err(CorruptionReason::TruncatedPayload),
            ReadResult::Full => {}
        }

        let header = WalHeader::from_bytes(&header_buf).ok_or(CorruptionReason::TruncatedPayload)?;
        if !header.is_expected_magic_and_version() {
            return Err(CorruptionReason::BadMagicOrVersion);
        }
        let entry_type = WalEntryType::try_from(header.entry_type)
            .map_err(|()| CorruptionReason::UnknownEntryType(header.entry_type))?;

        let mut payload = vec![0u8; header.payload_size as usize];
        if self.file.read_exact(&mut payload).is_err() {
            return Err(CorruptionReason::TruncatedPayload);
        }

        let expected = compute_checksum(entry_type, header.sequence, header.ts_ns, &payload);
        if expected != header.checksum {
            return Err(CorruptionReason::ChecksumMismatch);
        }

        Ok(Some(RawWalEntry {
            sequence: header.sequence,
            ts_ns: header.ts_ns,
            entry_type,
            payload,
        }))
    }
}

enum ReadResult {
    Full,
    Truncated,
    Eof,
}

fn read_exact_or_eof(file: &mut File, buf: &mut [u8]) -> ReadResult {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => {
                return if total == 0 {
                    ReadResult::Eof
                } else {
                    ReadResult::Truncated
                };
            }
            Ok(n) => total += n,
            Err(_) => return ReadResult::Truncated,
        }
    }
    ReadResult::Full
}
