//! Executors handlers run on: the background worker pool and the main loop.

pub mod main_loop;
pub mod worker_pool;
