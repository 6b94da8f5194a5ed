//! Shared types, error taxonomy, and configuration loading for VeloZ core crates.

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

pub use config::CoreConfig;
pub use errors::ErrorKind;
pub use types::{Px, Qty, Side, Symbol, Ts};
