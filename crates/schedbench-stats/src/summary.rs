//! Summary statistics and report rendering.

use std::fmt::Write as _;

use serde::Serialize;

use crate::duration::format_seconds;
use crate::parser::{CycleLog, CycleSample};

/// Percentiles reported when none are requested.
pub const DEFAULT_PERCENTILES: [u32; 3] = [90, 75, 25];

/// Order statistics over one series of samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub max: f64,
    /// `(percentile, value)`, highest percentile first.
    pub percentiles: Vec<(u32, f64)>,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
}

impl Summary {
    /// Summarize `samples`; `None` when there are none.
    ///
    /// Percentiles use the nearest sample rank, ties going to the even
    /// rank.
    pub fn compute(samples: &[f64], percentiles: &[u32]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut requested: Vec<u32> = percentiles.iter().map(|p| (*p).min(100)).collect();
        requested.sort_unstable_by(|a, b| b.cmp(a));

        Some(Self {
            max: sorted[sorted.len() - 1],
            percentiles: requested
                .into_iter()
                .map(|p| (p, nearest(&sorted, p)))
                .collect(),
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median: nearest(&sorted, 50),
            min: sorted[0],
        })
    }

    /// Labelled rows in report order.
    pub fn rows(&self) -> Vec<(String, f64)> {
        let mut rows = vec![("Max".to_string(), self.max)];
        rows.extend(self.percentiles.iter().map(|(p, v)| (format!("{p}p"), *v)));
        rows.push(("Mean".to_string(), self.mean));
        rows.push(("Median".to_string(), self.median));
        rows.push(("Min".to_string(), self.min));
        rows
    }

    fn render(&self, out: &mut String, what: &str, is_time: bool) {
        for (label, value) in self.rows() {
            let value = if is_time {
                format_seconds(value)
            } else {
                (value.trunc() as i64).to_string()
            };
            let _ = writeln!(out, "{label} {what}: {value}");
        }
        out.push('\n');
    }
}

fn nearest(sorted: &[f64], percentile: u32) -> f64 {
    let rank = (f64::from(percentile) / 100.0 * (sorted.len() - 1) as f64).round_ties_even();
    sorted[(rank as usize).min(sorted.len() - 1)]
}

fn rounded_mean(values: impl Iterator<Item = u64>) -> u64 {
    let values: Vec<u64> = values.collect();
    if values.is_empty() {
        return 0;
    }
    let mean = values.iter().sum::<u64>() as f64 / values.len() as f64;
    (mean + 0.5) as u64
}

/// Per-cycle job event statistics.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub jobs_considered: usize,
    pub jobs_run: u64,
    pub not_run_immediately: usize,
    pub considered: Option<Summary>,
    pub preempted: Option<Summary>,
    pub top: Option<Summary>,
    pub run: Option<Summary>,
    /// Rounded per-cycle averages: considered, preempted, top, run.
    pub averages: [u64; 4],
}

/// Everything printed for one log directory.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub total_cycles: usize,
    pub cycle_time: Option<Summary>,
    pub long_cycles: Vec<(String, String, f64)>,
    pub jobs: Option<JobReport>,
}

impl CycleReport {
    pub fn build(log: &CycleLog, percentiles: &[u32]) -> Self {
        let times: Vec<f64> = log.cycles.iter().map(|c| c.seconds).collect();
        let series = |f: fn(&CycleSample) -> u64| -> Vec<u64> {
            log.cycles.iter().map(f).collect()
        };
        let as_f64 = |v: &[u64]| -> Vec<f64> { v.iter().map(|n| *n as f64).collect() };

        let jobs = log.detailed.then(|| {
            let considered = series(|c| c.considered);
            let preempted = series(|c| c.preempted);
            let top = series(|c| c.top);
            let run = series(|c| c.run);
            JobReport {
                jobs_considered: log.considered_jobs.len(),
                jobs_run: log.total_run(),
                not_run_immediately: log.not_run_immediately(),
                considered: Summary::compute(&as_f64(&considered), percentiles),
                preempted: Summary::compute(&as_f64(&preempted), percentiles),
                top: Summary::compute(&as_f64(&top), percentiles),
                run: Summary::compute(&as_f64(&run), percentiles),
                averages: [
                    rounded_mean(considered.into_iter()),
                    rounded_mean(preempted.into_iter()),
                    rounded_mean(top.into_iter()),
                    rounded_mean(run.into_iter()),
                ],
            }
        });

        Self {
            total_cycles: log.cycles.len(),
            cycle_time: Summary::compute(&times, percentiles),
            long_cycles: log
                .long()
                .map(|c| (c.started.clone(), c.ended.clone(), c.seconds))
                .collect(),
            jobs,
        }
    }

    /// Plain-text report. `verbose` prints full summaries of the job
    /// event series instead of rounded averages.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        for (start, end, seconds) in &self.long_cycles {
            let _ = writeln!(
                out,
                "Long Cycle: {} Start: {start} End: {end}",
                format_seconds(*seconds)
            );
        }
        let _ = writeln!(out, "Total cycles: {}", self.total_cycles);
        if let Some(summary) = &self.cycle_time {
            summary.render(&mut out, "cycle time", true);
        }

        let Some(jobs) = &self.jobs else {
            return out;
        };
        let _ = writeln!(out, "Total Jobs Considered: {}", jobs.jobs_considered);
        let _ = writeln!(out, "Total jobs run {}", jobs.jobs_run);
        let _ = writeln!(out, "Jobs not run immediately: {}", jobs.not_run_immediately);
        out.push_str("Average scheduler stats per cycle:\n");

        if verbose {
            let series = [
                (&jobs.considered, "jobs considered"),
                (&jobs.preempted, "jobs preempted"),
                (&jobs.top, "top jobs"),
                (&jobs.run, "jobs run"),
            ];
            for (summary, what) in series {
                if let Some(summary) = summary {
                    summary.render(&mut out, what, false);
                }
            }
        } else {
            let [considered, preempted, top, run] = jobs.averages;
            let _ = writeln!(out, "Jobs considered: {considered}");
            let _ = writeln!(out, "Jobs preempted: {preempted}");
            let _ = writeln!(out, "Top jobs: {top}");
            let _ = writeln!(out, "Jobs run: {run}");
        }
        out
    }
}
