//! Background Tasks Module
//!
//! Periodic maintenance running beside the cache.

mod sweeper;

pub use sweeper::{spawn_sweeper_task, SweeperHandle};
