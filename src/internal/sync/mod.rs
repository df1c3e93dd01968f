//! Cooperative concurrency primitives.

mod fifo_mutex;

pub use fifo_mutex::{FifoGuard, FifoMutex};
