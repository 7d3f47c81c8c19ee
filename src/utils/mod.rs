pub mod logging;
pub mod metrics;

// Re-export common functions
pub use logging::{default_log_file, init_logging};
