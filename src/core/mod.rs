pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError};
pub use logging::init_tracing;
