// Domain models: samples pulled from the Plan database, retained segments,
// trimming statistics, and the labeled rows exported to CSV.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One timestamped metrics row from `plan_tps`, with the backward-merged
/// average ping. Metric fields are carried through unchanged; only
/// `players_online` drives the trimming logic.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub players_online: Option<u32>,
    pub tps: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub ram_usage: Option<f64>,
    pub avg_ping: Option<f64>,
}

impl Sample {
    /// Missing or malformed player counts are treated as zero.
    pub fn players(&self) -> u32 {
        self.players_online.unwrap_or(0)
    }

    pub fn is_inactive(&self) -> bool {
        self.players() == 0
    }
}

/// A maximal contiguous sub-run of samples retained after trimming.
/// Non-empty; segments of one run never overlap and stay time-ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub samples: Vec<Sample>,
}

impl Segment {
    pub fn start(&self) -> DateTime<Utc> {
        self.samples[0].timestamp
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.samples[self.samples.len() - 1].timestamp
    }

    pub fn duration_minutes(&self) -> f64 {
        minutes_between(self.start(), self.end())
    }
}

/// A portion of a long inactive period that was cut.
///
/// `start`/`end` are sample timestamps, while `duration_minutes` is the
/// trimmed excess. For a single-sample inactive group the two coincide
/// (`start == end`) yet the duration is the forward gap beyond the cap,
/// so it can be nonzero for a zero-extent span.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscardedSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: f64,
}

/// What the trimming pass kept and removed for one run. Derived, never
/// mutated: accepted + rejected == total within floating-point tolerance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    pub total_minutes: f64,
    pub accepted_minutes: f64,
    pub rejected_minutes: f64,
    pub discarded: Vec<DiscardedSpan>,
}

/// One row of a per-treatment response-variables CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub date: String,
    pub tps: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub ram_usage: Option<f64>,
    pub players_online: Option<u32>,
    pub avg_ping: Option<f64>,
    pub treatment: String,
    pub iteration: String,
}

impl ResponseRow {
    /// Labels a sample with its treatment/iteration ids; the timestamp is
    /// rendered in the experiment timezone, matching the source data files.
    pub fn from_sample(sample: &Sample, tz: Tz, treatment: &str, iteration: &str) -> Self {
        ResponseRow {
            date: sample
                .timestamp
                .with_timezone(&tz)
                .format("%Y-%m-%d %H:%M:%S%:z")
                .to_string(),
            tps: sample.tps,
            cpu_usage: sample.cpu_usage,
            ram_usage: sample.ram_usage,
            players_online: sample.players_online,
            avg_ping: sample.avg_ping,
            treatment: treatment.to_string(),
            iteration: iteration.to_string(),
        }
    }
}

/// Wall-clock span in minutes; negative spans never occur for sorted input.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}
