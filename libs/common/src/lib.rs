//! Spoccer common library
//!
//! Functions shared by the spoccer tools:
//! - logging initialization with the bracketed-level format
//! - layered configuration loading (defaults, config file, environment)

pub mod config;
pub mod logging;

pub use config::{load_config, to_yaml};
pub use logging::{init_with_config, LogConfig};
