//! Event loop/scheduler, MPMC queue, and arena/pool allocators for the VeloZ
//! data plane (C1, C2, C3).

#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod arena;
mod queue;
mod scheduler;
mod timer;

pub use arena::{Arena, Pool};
pub use queue::{MpmcQueue, QueueError};
pub use scheduler::{Priority, Scheduler, SchedulerError, Task, TaskHandle};
