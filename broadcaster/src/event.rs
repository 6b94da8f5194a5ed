//! The broadcaster's event envelope (C10).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A broadcast event. `id` is assigned by the broadcaster under its lock
/// and is strictly monotonic across the lifetime of one broadcaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub payload: Value,
}
