//! Single source of truth for magic numbers shared across VeloZ crates.

/// Fixed-point scale factor (4 decimal places): 1 tick = 0.0001.
pub const SCALE: i64 = 10_000;

// Time constants
pub const NANOS_PER_MILLI: u64 = 1_000_000;
pub const MILLIS_PER_SEC: u64 = 1000;

// Execution backoff (spec §4.7 / C7)
pub const BACKOFF_BASE_MS: u64 = 100;
pub const BACKOFF_FACTOR: u32 = 2;
pub const BACKOFF_CAP_MS: u64 = 30_000;
pub const IDEMPOTENCY_TTL_MS: u64 = 60_000;

// Circuit breaker (C9)
pub const CIRCUIT_TRIP_THRESHOLD: u32 = 5;
pub const CIRCUIT_INITIAL_COOLDOWN_MS: u64 = 1000;
pub const CIRCUIT_MAX_COOLDOWN_MS: u64 = 60_000;

// Event loop / scheduler (C1)
pub const HIGH_PRIORITY_STARVATION_LIMIT: u32 = 64;

// Bounded queues (C2, C10)
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 1024;
pub const DEFAULT_BROADCAST_HISTORY: usize = 10_000;

// Rate limiter (C13)
pub const DEFAULT_RATE_LIMIT_CAPACITY: u64 = 100;
pub const DEFAULT_RATE_LIMIT_REFILL_PER_SEC: u64 = 10;
pub const RATE_LIMITER_CLEANUP_INTERVAL_SECS: u64 = 300;
pub const RATE_LIMITER_MAX_ENTRIES: usize = 10_000;

// WAL (C6): magic(4) + version(1) + entry_type(1) + sequence(8) + ts_ns(8)
// + payload_size(4) + checksum(4)
pub const WAL_HEADER_SIZE: usize = 30;
pub const WAL_MAGIC: u32 = 0x5741_4C45; // "WALE"
pub const WAL_VERSION: u8 = 1;
pub const DEFAULT_WAL_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;
pub const DEFAULT_WAL_CHECKPOINT_INTERVAL: u64 = 10_000;
pub const DEFAULT_WAL_MAX_FILES: usize = 100;

// Risk limits (C9 defaults, overridable via config)
pub const DEFAULT_MAX_ORDER_VALUE: i64 = 1_000_000 * SCALE;
pub const DEFAULT_MAX_POSITION_VALUE: i64 = 10_000_000 * SCALE;
pub const DEFAULT_MAX_DAILY_LOSS: i64 = 100_000 * SCALE;

// Numeric limits for validation
pub const MAX_PRICE_TICKS: i64 = i64::MAX / SCALE;
pub const MAX_QTY_TICKS: i64 = 1_000_000_000 * SCALE;
