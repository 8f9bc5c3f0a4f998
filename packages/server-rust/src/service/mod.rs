//! Validation pipeline behind the HTTP layer.
//!
//! 1. **Configuration** (`config`): chunk size, worker count, queue depth
//! 2. **Worker pool** (`worker`): bounded concurrent chunk validation
//! 3. **Orchestration** (`orchestrator`): read, validate, barrier, aggregate

pub mod config;
pub mod orchestrator;
pub mod worker;

pub use config::ValidationConfig;
pub use orchestrator::{ValidateError, ValidationOrchestrator};
pub use worker::{ChunkResult, ChunkWorkerPool, PoolError};
