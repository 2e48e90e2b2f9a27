//! Execution contexts and the stock worker pool.
//!
//! - [`context`]: the [`ExecutionContext`] trait tasks are forked onto
//! - [`pool`]: a lazily growing thread pool implementing it
//! - [`config`]: pool configuration from code, environment, or TOML

pub mod config;
pub mod context;
pub mod pool;

pub use config::{ConfigError, PoolConfig};
pub use context::{ExecutionContext, Inline, Job, Rejected};
pub use pool::{WorkerPool, WorkerPoolHandle};
