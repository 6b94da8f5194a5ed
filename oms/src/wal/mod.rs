//! Binary-framed write-ahead log for the order store (C6).
//!
//! Grounded on the checksummed, versioned binary WAL frame format used for
//! trade/order journaling in the adjacent matching-engine reference code in
//! this codebase's history (header + CRC32 over header-and-payload, replay
//! tolerant of a corrupt tail entry), adapted to this store's own entry
//! vocabulary and to `thiserror`/`tracing` instead of raw `io::Error`
//! string matching.

mod header;
mod reader;
mod replay;
mod writer;

pub use header::{WalEntryType, WalHeader};
pub use reader::{RawWalEntry, WalReader};
pub use replay::{replay_and_resume, replay_directory, ReplayOutcome, ReplayStats};
pub use writer::{WalError, WalWriter, WalWriterConfig};
