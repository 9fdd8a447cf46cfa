pub mod config;
pub mod error;
pub mod hosts;
pub mod matrix;
pub mod types;

pub use config::{BenchConfig, ScenarioConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
