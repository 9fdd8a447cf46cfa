//! schedbench stats: scheduling cycle analysis from scheduler logs.
//!
//! # Modules
//!
//! - **`parser`**: Walk dated log files and collect per-cycle samples
//! - **`summary`**: Max, percentiles, mean, median, min over samples
//! - **`duration`**: Human-readable rendering of cycle durations
//! - **`error`**: Error types

pub mod duration;
pub mod error;
pub mod parser;
pub mod summary;

pub use duration::format_seconds;
pub use error::{StatsError, StatsResult};
pub use parser::{CycleLog, CycleParser, CycleSample, LogRange, ParseOptions, parse_dir};
pub use summary::{CycleReport, DEFAULT_PERCENTILES, JobReport, Summary};
