use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::roadmap::VertexId;

/// One participant in the instance: a disk moving from `start` to `goal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: VertexId,
    pub goal: VertexId,
}

/// A single timed traversal of an agent along edge `(u, v)`. A wait move
/// has `u == v`; any other move has `t_end == t_start + duration(u, v)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub agent: usize,
    pub u: VertexId,
    pub v: VertexId,
    pub t_start: f64,
    pub t_end: f64,
}

impl Move {
    pub fn is_wait(&self) -> bool {
        self.u == self.v
    }

    pub fn duration(&self) -> f64 {
        self.t_end - self.t_start
    }
}

/// An ordered, temporally contiguous sequence of moves for a single
/// agent, from its start vertex at t=0 to its goal vertex at `finish_time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub moves: Vec<Move>,
}

impl Path {
    pub fn finish_time(&self) -> f64 {
        self.moves.last().map(|m| m.t_end).unwrap_or(0.0)
    }

    pub fn goal_vertex(&self) -> Option<VertexId> {
        self.moves.last().map(|m| m.v)
    }
}

/// Loads the per-agent task list from a YAML file of `{id, start, goal}`
/// records, one entry per agent.
pub fn load_agents(path: &std::path::Path) -> SolverResult<Vec<Agent>> {
    let text = fs::read_to_string(path)
        .map_err(|e| SolverError::InvalidInput(format!("reading tasks file {path:?}: {e}")))?;
    let records: Vec<AgentRecord> = serde_yaml::from_str(&text)
        .map_err(|e| SolverError::InvalidInput(format!("parsing tasks YAML {path:?}: {e}")))?;

    Ok(records
        .into_iter()
        .map(|r| Agent { id: r.id, start: VertexId(r.start), goal: VertexId(r.goal) })
        .collect())
}

#[derive(Debug, Deserialize)]
struct AgentRecord {
    id: usize,
    start: usize,
    goal: usize,
}
