//! Core utilities, configuration, errors, and logging

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_cookies_configuration};
