//! Scheduler log parsing.
//!
//! Log files are named by date (`YYYYMMDD`) and read in ascending order. A
//! scheduling cycle is the span between a "Starting Scheduling Cycle" line
//! and the next "Leaving Scheduling Cycle" line, and may cross a file
//! boundary.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::duration::format_seconds;
use crate::error::{StatsError, StatsResult};

const CYCLE_START: &str = "Starting Scheduling Cycle";
const CYCLE_END: &str = "Leaving Scheduling Cycle";
const CONSIDERING: &str = "Considering job to run";
const PREEMPTED: &str = "Job preempted by";
const RUN: &str = "Job run";
const TOP_JOB: &str = "Job is a top job";

/// Inclusive range of log file dates to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRange {
    pub start: u32,
    pub end: u32,
}

impl Default for LogRange {
    fn default() -> Self {
        Self {
            start: 0,
            end: 99_999_999,
        }
    }
}

impl LogRange {
    pub fn contains(&self, date: u32) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub range: LogRange,
    /// Count per-cycle job events as well as cycle durations.
    pub detailed: bool,
    /// Cycles longer than this many seconds are reported individually.
    pub long_threshold: f64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            range: LogRange::default(),
            detailed: false,
            long_threshold: 1200.0,
        }
    }
}

/// One completed scheduling cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSample {
    pub started: String,
    pub ended: String,
    pub seconds: f64,
    pub considered: u64,
    pub preempted: u64,
    pub run: u64,
    pub top: u64,
}

/// Everything collected from a log directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleLog {
    pub cycles: Vec<CycleSample>,
    /// Indices into `cycles` of cycles over the long threshold.
    pub long_cycles: Vec<usize>,
    /// How many times each job id was considered (detailed mode only).
    pub considered_jobs: BTreeMap<String, u64>,
    pub detailed: bool,
}

impl CycleLog {
    pub fn long(&self) -> impl Iterator<Item = &CycleSample> {
        self.long_cycles.iter().filter_map(|&i| self.cycles.get(i))
    }

    /// Jobs considered in more than one cycle.
    pub fn not_run_immediately(&self) -> usize {
        self.considered_jobs.values().filter(|&&n| n > 1).count()
    }

    pub fn total_run(&self) -> u64 {
        self.cycles.iter().map(|c| c.run).sum()
    }
}

#[derive(Debug, Default)]
struct OpenCycle {
    at: Option<(NaiveDateTime, String)>,
    considered: u64,
    preempted: u64,
    run: u64,
    top: u64,
}

/// Line-at-a-time cycle accumulator.
#[derive(Debug)]
pub struct CycleParser {
    options: ParseOptions,
    open: OpenCycle,
    log: CycleLog,
}

impl CycleParser {
    pub fn new(options: ParseOptions) -> Self {
        let log = CycleLog {
            detailed: options.detailed,
            ..Default::default()
        };
        Self {
            options,
            open: OpenCycle::default(),
            log,
        }
    }

    /// Feed one log line. `file` is only used in diagnostics.
    pub fn feed(&mut self, file: &str, line: &str) -> StatsResult<()> {
        if line.contains(CYCLE_START) {
            let (at, text) = timestamp(file, line)?;
            self.open = OpenCycle {
                at: Some((at, text)),
                ..Default::default()
            };
        } else if line.contains(CYCLE_END) {
            let (end, end_text) = timestamp(file, line)?;
            self.close(file, end, end_text);
        } else if self.options.detailed {
            self.count(line);
        }
        Ok(())
    }

    fn close(&mut self, file: &str, end: NaiveDateTime, end_text: String) {
        // Taking the cycle means a repeated end without a new start counts once.
        let open = std::mem::take(&mut self.open);
        // The first file may begin in the middle of a cycle.
        let Some((start, started)) = open.at else {
            debug!(file, "cycle end without a start");
            return;
        };
        if end < start {
            warn!(file, start = %started, end = %end_text, "cycle ends before it starts, ignoring");
            return;
        }

        let seconds = (end - start)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or_default();
        if seconds > self.options.long_threshold {
            info!(
                duration = %format_seconds(seconds),
                start = %started,
                end = %end_text,
                "long cycle"
            );
            self.log.long_cycles.push(self.log.cycles.len());
        }
        self.log.cycles.push(CycleSample {
            started,
            ended: end_text,
            seconds,
            considered: open.considered,
            preempted: open.preempted,
            run: open.run,
            top: open.top,
        });
    }

    fn count(&mut self, line: &str) {
        if line.contains(CONSIDERING) {
            self.open.considered += 1;
            if let Some(job) = line.split(';').nth(4) {
                *self.log.considered_jobs.entry(job.to_string()).or_default() += 1;
            }
        } else if line.contains(PREEMPTED) {
            self.open.preempted += 1;
        } else if line.contains(RUN) {
            self.open.run += 1;
        } else if line.contains(TOP_JOB) {
            self.open.top += 1;
        }
    }

    pub fn finish(self) -> CycleLog {
        self.log
    }
}

fn timestamp(file: &str, line: &str) -> StatsResult<(NaiveDateTime, String)> {
    let text = line.split(';').next().unwrap_or_default().trim();
    let format = if text.contains('.') {
        "%m/%d/%Y %H:%M:%S%.f"
    } else {
        "%m/%d/%Y %H:%M:%S"
    };
    NaiveDateTime::parse_from_str(text, format)
        .map(|at| (at, text.to_string()))
        .map_err(|_| StatsError::BadTimestamp {
            file: file.to_string(),
            timestamp: text.to_string(),
        })
}

/// Dated log files under `dir` within `range`, oldest first.
pub fn log_files(dir: &Path, range: LogRange) -> StatsResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(StatsError::NotADirectory(dir.to_path_buf()));
    }
    let entries = fs::read_dir(dir).map_err(|source| StatsError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut dated: Vec<(u32, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StatsError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let Ok(date) = name.parse::<u32>() else { continue };
        if range.contains(date) {
            dated.push((date, entry.path()));
        }
    }
    dated.sort();
    Ok(dated.into_iter().map(|(_, path)| path).collect())
}

/// Parse every dated log file in `dir`.
pub fn parse_dir(dir: &Path, options: ParseOptions) -> StatsResult<CycleLog> {
    let files = log_files(dir, options.range)?;
    debug!(dir = %dir.display(), files = files.len(), "reading scheduler logs");

    let mut parser = CycleParser::new(options);
    for path in files {
        let bytes = fs::read(&path).map_err(|source| StatsError::Io {
            path: path.clone(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let file = path.display().to_string();
        for line in text.lines() {
            parser.feed(&file, line)?;
        }
    }
    Ok(parser.finish())
}
