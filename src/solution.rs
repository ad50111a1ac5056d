//! Solution reporting: the run summary and per-agent move log written at
//! the end of a solve, as both a human-readable debug log and a
//! machine-parseable summary.

use std::fs::File;
use std::io::{self, Write};

use serde::Serialize;

use crate::agent::Path;
use crate::error::NoSolutionReason;
use crate::highlevel::{Outcome, SearchOutcome};

/// Serializable mirror of [`NoSolutionReason`] (the error type itself is
/// not `Serialize`, since it also carries the library's plain
/// `std::error::Error` impl).
#[derive(Debug, Clone, Copy, Serialize)]
pub enum NoSolutionReasonDto {
    Timeout,
    StepLimit,
    Infeasible,
}

impl From<NoSolutionReason> for NoSolutionReasonDto {
    fn from(reason: NoSolutionReason) -> Self {
        match reason {
            NoSolutionReason::Timeout => NoSolutionReasonDto::Timeout,
            NoSolutionReason::StepLimit => NoSolutionReasonDto::StepLimit,
            NoSolutionReason::Infeasible => NoSolutionReasonDto::Infeasible,
        }
    }
}

/// The complete record of one solver run: whether a
/// solution was found, its cost summaries, the search's expansion
/// counters, the elapsed wall time, and (if found) the paths themselves.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub found: bool,
    pub reason: Option<NoSolutionReasonDto>,
    pub flowtime: f64,
    pub makespan: f64,
    pub time_ms: u128,
    pub high_level_expanded: usize,
    pub low_level_expansions: usize,
    pub paths: Vec<Path>,
}

impl Solution {
    /// Builds a [`Solution`] from a completed [`SearchOutcome`] and the
    /// elapsed wall-clock duration of the run.
    pub fn from_outcome(outcome: SearchOutcome, elapsed: std::time::Duration) -> Solution {
        match outcome.result {
            Outcome::Found(paths) => {
                let flowtime = paths.iter().map(Path::finish_time).sum();
                let makespan = paths.iter().map(Path::finish_time).fold(0.0, f64::max);
                Solution {
                    found: true,
                    reason: None,
                    flowtime,
                    makespan,
                    time_ms: elapsed.as_millis(),
                    high_level_expanded: outcome.high_level_expanded,
                    low_level_expansions: outcome.low_level_expansions,
                    paths,
                }
            }
            Outcome::NotFound(reason) => Solution {
                found: false,
                reason: Some(reason.into()),
                flowtime: 0.0,
                makespan: 0.0,
                time_ms: elapsed.as_millis(),
                high_level_expanded: outcome.high_level_expanded,
                low_level_expansions: outcome.low_level_expansions,
                paths: Vec::new(),
            },
        }
    }

    /// Renders the human-readable `<agent>` block log: one block per
    /// agent, one line per move.
    pub fn to_log(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "found={} flowtime={:.6} makespan={:.6} time_ms={} high_level_expanded={} low_level_expansions={}\n",
            self.found, self.flowtime, self.makespan, self.time_ms, self.high_level_expanded, self.low_level_expansions
        ));
        if let Some(reason) = self.reason {
            out.push_str(&format!("reason={reason:?}\n"));
        }
        for (id, path) in self.paths.iter().enumerate() {
            out.push_str(&format!("<agent id=\"{id}\">\n"));
            for mv in &path.moves {
                out.push_str(&format!(
                    "  {:.6} -> {:.6} : ({}) -> ({})\n",
                    mv.t_start, mv.t_end, mv.u.0, mv.v.0
                ));
            }
            out.push_str("</agent>\n");
        }
        out
    }

    pub fn write_log(&self, path: &std::path::Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.to_log().as_bytes())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &std::path::Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Move;
    use crate::roadmap::VertexId;
    use std::time::Duration;

    fn sample_outcome() -> SearchOutcome {
        SearchOutcome {
            result: Outcome::Found(vec![Path {
                moves: vec![Move { agent: 0, u: VertexId(0), v: VertexId(1), t_start: 0.0, t_end: 1.0 }],
            }]),
            high_level_expanded: 3,
            low_level_expansions: 10,
        }
    }

    #[test]
    fn found_solution_computes_flowtime_and_makespan() {
        let solution = Solution::from_outcome(sample_outcome(), Duration::from_millis(42));
        assert!(solution.found);
        assert_eq!(solution.flowtime, 1.0);
        assert_eq!(solution.makespan, 1.0);
        assert_eq!(solution.time_ms, 42);
    }

    #[test]
    fn log_contains_one_block_per_agent() {
        let solution = Solution::from_outcome(sample_outcome(), Duration::from_millis(1));
        let log = solution.to_log();
        assert!(log.contains("<agent id=\"0\">"));
        assert!(log.contains("</agent>"));
    }

    #[test]
    fn not_found_solution_has_zero_costs_and_a_reason() {
        let outcome = SearchOutcome {
            result: Outcome::NotFound(NoSolutionReason::Infeasible),
            high_level_expanded: 5,
            low_level_expansions: 7,
        };
        let solution = Solution::from_outcome(outcome, Duration::from_millis(3));
        assert!(!solution.found);
        assert_eq!(solution.flowtime, 0.0);
        assert!(solution.reason.is_some());
    }

    #[test]
    fn json_round_trips_through_serde() {
        let solution = Solution::from_outcome(sample_outcome(), Duration::from_millis(1));
        let json = solution.to_json().unwrap();
        assert!(json.contains("\"found\": true"));
    }
}
