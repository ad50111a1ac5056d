use anyhow::anyhow;
use clap::Parser;

use crate::hvalue::HlhType;

#[derive(Parser, Debug)]
#[command(
    name = "ccbs",
    about = "Continuous Conflict-Based Search over a roadmap graph.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to the roadmap XML file")]
    pub roadmap_path: String,

    #[arg(long, help = "Path to the per-agent task YAML file")]
    pub tasks_path: String,

    #[arg(long, help = "Path to write the human-readable solution log")]
    pub solution_path: String,

    #[arg(long, help = "Path to append the run-stats CSV row")]
    pub stats_path: Option<String>,

    #[arg(long, help = "Path to write a JSON solution export")]
    pub json_path: Option<String>,

    #[arg(long, help = "Agent disk radius", default_value_t = 0.5)]
    pub agent_radius: f64,

    #[arg(
        long,
        help = "Open-list state dedup precision for near-duplicate interval boundaries",
        default_value_t = 1e-6
    )]
    pub precision: f64,

    #[arg(long, help = "Wall-clock time limit in seconds", default_value_t = 60)]
    pub timelimit_secs: u64,

    #[arg(
        long,
        help = "h-value strategy: 0 = none, 1 = LP relaxation, 2 = greedy",
        default_value_t = 0
    )]
    pub hlh_type: u8,

    #[arg(
        long,
        help = "Precompute a reverse-Dijkstra heuristic table per goal vertex",
        default_value_t = true
    )]
    pub use_precalculated_heuristic: bool,

    #[arg(long, help = "Use disjoint splitting", default_value_t = false)]
    pub use_disjoint_splitting: bool,

    #[arg(long, help = "Prioritize cardinal conflicts when branching", default_value_t = true)]
    pub use_cardinal: bool,

    #[arg(long, help = "Detect and resolve corridor symmetry", default_value_t = false)]
    pub use_corridor_symmetry: bool,

    #[arg(long, help = "Detect and resolve target symmetry", default_value_t = false)]
    pub use_target_symmetry: bool,

    #[arg(long, help = "Abort the high-level search after this many expansions")]
    pub max_high_level_expansions: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub roadmap_path: String,
    pub tasks_path: String,
    pub solution_path: String,
    pub stats_path: Option<String>,
    pub json_path: Option<String>,
    pub agent_radius: f64,
    pub precision: f64,
    pub timelimit_secs: u64,
    pub hlh_type: HlhType,
    pub use_precalculated_heuristic: bool,
    pub use_disjoint_splitting: bool,
    pub use_cardinal: bool,
    pub use_corridor_symmetry: bool,
    pub use_target_symmetry: bool,
    pub max_high_level_expansions: Option<usize>,
}

impl Config {
    pub fn new(cli: &Cli) -> Self {
        Config {
            roadmap_path: cli.roadmap_path.clone(),
            tasks_path: cli.tasks_path.clone(),
            solution_path: cli.solution_path.clone(),
            stats_path: cli.stats_path.clone(),
            json_path: cli.json_path.clone(),
            agent_radius: cli.agent_radius,
            precision: cli.precision,
            timelimit_secs: cli.timelimit_secs,
            hlh_type: HlhType::from_config(cli.hlh_type),
            use_precalculated_heuristic: cli.use_precalculated_heuristic,
            use_disjoint_splitting: cli.use_disjoint_splitting,
            use_cardinal: cli.use_cardinal,
            use_corridor_symmetry: cli.use_corridor_symmetry,
            use_target_symmetry: cli.use_target_symmetry,
            max_high_level_expansions: cli.max_high_level_expansions,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agent_radius <= 0.0 || self.agent_radius > 0.5 {
            return Err(anyhow!(
                "agent_radius must be in (0, 0.5], got {}",
                self.agent_radius
            ));
        }
        if self.precision <= 0.0 {
            return Err(anyhow!("precision must be positive, got {}", self.precision));
        }
        if self.timelimit_secs == 0 {
            return Err(anyhow!("timelimit_secs must be at least 1"));
        }
        if let Some(limit) = self.max_high_level_expansions {
            if limit == 0 {
                return Err(anyhow!("max_high_level_expansions must be at least 1 when set"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(agent_radius: f64, precision: f64, timelimit_secs: u64) -> Cli {
        Cli {
            roadmap_path: "roadmap.xml".into(),
            tasks_path: "tasks.yaml".into(),
            solution_path: "solution.log".into(),
            stats_path: None,
            json_path: None,
            agent_radius,
            precision,
            timelimit_secs,
            hlh_type: 0,
            use_precalculated_heuristic: true,
            use_disjoint_splitting: false,
            use_cardinal: true,
            use_corridor_symmetry: false,
            use_target_symmetry: false,
            max_high_level_expansions: None,
        }
    }

    #[test]
    fn rejects_non_positive_agent_radius() {
        let config = Config::new(&cli(0.0, 1e-6, 60));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_agent_radius_above_one_half() {
        let config = Config::new(&cli(0.51, 1e-6, 60));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timelimit() {
        let config = Config::new(&cli(0.5, 1e-6, 0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_sensible_defaults() {
        let config = Config::new(&cli(0.5, 1e-6, 60));
        assert!(config.validate().is_ok());
    }
}
