use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ccbs::agent::load_agents;
use ccbs::branching::HeuristicBranching;
use ccbs::config::{Cli, Config};
use ccbs::highlevel::{self, HighLevelConfig};
use ccbs::roadmap::Roadmap;
use ccbs::sipp::SippConfig;
use ccbs::solution::Solution;
use ccbs::stats;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::new(&cli);
    config.validate().context("invalid configuration")?;

    let mut roadmap = Roadmap::load(Path::new(&config.roadmap_path))
        .with_context(|| format!("loading roadmap from {}", config.roadmap_path))?;
    let agents = load_agents(Path::new(&config.tasks_path))
        .with_context(|| format!("loading tasks from {}", config.tasks_path))?;

    if config.use_precalculated_heuristic {
        for agent in &agents {
            roadmap.precompute_heuristic(agent.goal);
        }
    }

    info!(num_agents = agents.len(), "starting solve");

    let started = Instant::now();
    let deadline = started + Duration::from_secs(config.timelimit_secs);
    let hl_config = HighLevelConfig {
        agent_radius: config.agent_radius,
        sipp: SippConfig { precision: config.precision, deadline: Some(deadline) },
        hlh_type: config.hlh_type,
        use_disjoint_splitting: config.use_disjoint_splitting,
        use_cardinal: config.use_cardinal,
        use_corridor_symmetry: config.use_corridor_symmetry,
        use_target_symmetry: config.use_target_symmetry,
        max_high_level_expansions: config.max_high_level_expansions,
        deadline: Some(deadline),
    };

    let mut branching = HeuristicBranching { prioritize_cardinal: config.use_cardinal };
    let outcome = highlevel::solve(&roadmap, &agents, &hl_config, &mut branching)
        .context("high-level search failed")?;
    let elapsed = started.elapsed();

    let solution = Solution::from_outcome(outcome, elapsed);
    info!(
        found = solution.found,
        flowtime = solution.flowtime,
        makespan = solution.makespan,
        time_ms = solution.time_ms,
        "solve finished"
    );

    solution
        .write_log(Path::new(&config.solution_path))
        .with_context(|| format!("writing solution log to {}", config.solution_path))?;

    if let Some(json_path) = &config.json_path {
        solution
            .write_json(Path::new(json_path))
            .with_context(|| format!("writing JSON export to {json_path}"))?;
    }

    stats::append_row(&config, &solution);

    Ok(())
}
