//! csvcheck server: HTTP endpoint and concurrent validation pipeline for
//! large CSV files.

pub mod error;
pub mod network;
pub mod service;

pub use error::ApiError;
pub use network::{NetworkConfig, NetworkModule};
pub use service::{ValidationConfig, ValidationOrchestrator};
