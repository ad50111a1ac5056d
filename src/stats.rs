//! Run-stats CSV logging: one append-only row per run, for batch
//! experiments across configurations.

use std::fs::OpenOptions;
use std::io::Write;

use tracing::error;

use crate::config::Config;
use crate::solution::Solution;

/// Appends one CSV row to `config.stats_path`, if set. Silently does
/// nothing when no stats path was configured.
pub fn append_row(config: &Config, solution: &Solution) {
    let Some(path) = &config.stats_path else {
        return;
    };

    let row = format!(
        "{},{},{},{:?},{},{:.6},{:.6},{},{},{}\n",
        config.roadmap_path,
        config.tasks_path,
        config.agent_radius,
        config.hlh_type,
        solution.found,
        solution.flowtime,
        solution.makespan,
        solution.time_ms,
        solution.high_level_expanded,
        solution.low_level_expansions,
    );

    let file = OpenOptions::new().create(true).append(true).open(path);
    match file {
        Ok(mut file) => {
            if let Err(e) = file.write_all(row.as_bytes()) {
                error!("failed to write stats row to '{path}': {e}");
            }
        }
        Err(e) => error!("failed to open stats file '{path}': {e}"),
    }
}
