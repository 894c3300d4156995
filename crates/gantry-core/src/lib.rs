pub mod config;
pub mod types;

pub use config::{ConfigError, StackConfig};
pub use types::*;
