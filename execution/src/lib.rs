//! Venue execution plumbing (C7): the adapter contract, retry-with-backoff,
//! the idempotency map, and an in-process simulator adapter.

#![forbid(unsafe_code)]

mod adapter;
mod backoff;
mod idempotency;
mod retry;
mod simulator;

pub use adapter::{Ack, ExecutionAdapter, SubscriptionHandle};
pub use backoff::Backoff;
pub use idempotency::IdempotencyMap;
pub use retry::place_with_retry;
pub use simulator::Simulator;
