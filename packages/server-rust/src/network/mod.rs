//! HTTP surface: configuration, middleware, handlers, and server lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::*;
pub use handlers::AppState;
pub use module::{router, NetworkModule};
pub use shutdown::*;
