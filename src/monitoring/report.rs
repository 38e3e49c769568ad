use serde::Serialize;
use std::fmt;
use std::time::Duration;

use sql_replay_shared::LatencySummary;

use crate::replay::ReplaySummary;

/// End-of-run report: primary latency distribution plus replay counters.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub latency: LatencySummary,
    pub replay: ReplaySummary,
    pub comparison: bool,
}

impl ReplayReport {
    pub fn new(latency: LatencySummary, replay: ReplaySummary, comparison: bool) -> Self {
        Self {
            latency,
            replay,
            comparison,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn ms(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.3}ms", d.as_secs_f64() * 1000.0),
        None => "-".to_string(),
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.latency;
        writeln!(f, "collected {} stats", l.count)?;
        if l.count == 0 {
            writeln!(f, "no samples collected")?;
        } else {
            writeln!(
                f,
                "stats: median: {} mean: {} stddev: {}",
                ms(l.median),
                ms(l.mean),
                ms(l.stddev)
            )?;
            writeln!(
                f,
                "percentiles: 90: {} 95: {} 99: {} 99.9: {}",
                ms(l.p90),
                ms(l.p95),
                ms(l.p99),
                ms(l.p999)
            )?;
        }

        let r = &self.replay;
        writeln!(
            f,
            "sessions: {} records: {} malformed: {} queries: {} errors: {}",
            r.sessions_started, r.records_dispatched, r.malformed_records, r.queries, r.errors
        )?;
        if self.comparison {
            writeln!(
                f,
                "comparisons: {} mismatches: {} skipped: {}",
                r.comparisons, r.mismatches, r.skipped_comparisons
            )?;
        }
        if r.ignored > 0 {
            writeln!(f, "ignored after quit: {}", r.ignored)?;
        }
        Ok(())
    }
}
