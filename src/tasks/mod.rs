//! Background Tasks Module
//!
//! Contains the background task that runs for the lifetime of a cache.
//!
//! # Tasks
//! - Expiry Reaper: removes expired entries exactly when they fall due

mod reaper;

pub use reaper::{spawn_reaper, Reap, Schedule};
