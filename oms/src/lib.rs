//! Order store and write-ahead log (C5, C6).

#![forbid(unsafe_code)]

mod order;
mod wal;

pub use order::{
    ApplyOutcome, DropReason, ExecutionReport, OmsError, OrderRequest, OrderState, OrderStatus,
    OrderStore, OrderType,
};
pub use wal::{
    replay_and_resume, replay_directory, RawWalEntry, ReplayOutcome, ReplayStats, WalEntryType,
    WalError, WalHeader, WalReader, WalWriter, WalWriterConfig,
};
