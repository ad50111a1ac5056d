//! High-level search: the constraint-tree search over
//! per-agent paths, expanding the earliest conflict via standard or
//! disjoint splitting until a conflict-free node is found.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::agent::{Agent, Path};
use crate::branching::{BranchingPolicy, ConflictObservation};
use crate::conflict::{self, Conflict};
use crate::constraint::{Constraint, ConstraintSet};
use crate::error::NoSolutionReason;
use crate::geometry;
use crate::hvalue::{self, CardinalEdge, HlhType};
use crate::interval::Interval;
use crate::roadmap::{Roadmap, VertexId};
use crate::sipp::{self, SippConfig, SippOutcome};
use crate::symmetry::{self, Classification, ConflictKind};

/// Tunables for one solver run, filled in from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct HighLevelConfig {
    pub agent_radius: f64,
    pub sipp: SippConfig,
    pub hlh_type: HlhType,
    pub use_disjoint_splitting: bool,
    pub use_cardinal: bool,
    pub use_corridor_symmetry: bool,
    pub use_target_symmetry: bool,
    pub max_high_level_expansions: Option<usize>,
    pub deadline: Option<Instant>,
}

/// The outcome of a solver run together with its expansion counters,
/// always populated regardless of whether a solution was found.
#[derive(Debug)]
pub struct SearchOutcome {
    pub result: Outcome,
    pub high_level_expanded: usize,
    pub low_level_expansions: usize,
}

#[derive(Debug)]
pub enum Outcome {
    Found(Vec<Path>),
    NotFound(NoSolutionReason),
}

struct HighLevelNode {
    #[allow(dead_code)]
    parent: Option<usize>,
    depth: usize,
    constraints: Rc<ConstraintSet>,
    paths: Rc<Vec<Path>>,
    cost: f64,
    analysis: Vec<(Conflict, Classification)>,
    h: f64,
}

struct QueueEntry {
    f: f64,
    conflict_count: usize,
    id: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.conflict_count == other.conflict_count && self.id == other.id
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse everything so the lowest
        // (f, conflict_count, id) tuple is popped first.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.conflict_count.cmp(&self.conflict_count))
            .then_with(|| other.id.cmp(&self.id))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rejects instances referencing vertices absent from the roadmap, or
/// where two agents share a start vertex (they would already be
/// colliding at t=0, before any search can resolve it).
pub fn validate_input(roadmap: &Roadmap, agents: &[Agent]) -> crate::error::SolverResult<()> {
    for agent in agents {
        roadmap.validate_vertex(agent.start)?;
        roadmap.validate_vertex(agent.goal)?;
    }
    for i in 0..agents.len() {
        for j in (i + 1)..agents.len() {
            if agents[i].start == agents[j].start {
                return Err(crate::error::SolverError::InvalidInput(format!(
                    "agents {} and {} share start vertex {:?}",
                    agents[i].id, agents[j].id, agents[i].start
                )));
            }
        }
    }
    Ok(())
}

/// Checks invariant I2 (spec.md §3): a path SIPP reports as `Found` must
/// begin at the agent's start vertex at `t=0`, end at its goal vertex,
/// and be temporally contiguous (each move's `t_start` equals the
/// previous move's `t_end`). A violation here is not a planning failure
/// — SIPP already reported success — it means the low-level search or
/// its reconstruction has a bug, so it is fatal rather than a prunable
/// `NoPath`.
fn validate_node_invariants(agent: &Agent, path: &Path) -> crate::error::SolverResult<()> {
    use crate::error::SolverError;
    use crate::numeric::approx_eq;

    let Some(first) = path.moves.first() else {
        return Err(SolverError::InternalAssertionFailed(format!(
            "agent {} produced an empty path",
            agent.id
        )));
    };
    if first.u != agent.start || !approx_eq(first.t_start, 0.0) {
        return Err(SolverError::InternalAssertionFailed(format!(
            "agent {} path does not begin at its start vertex at t=0 (I2)",
            agent.id
        )));
    }
    let last = path.moves.last().expect("checked non-empty above");
    if last.v != agent.goal {
        return Err(SolverError::InternalAssertionFailed(format!(
            "agent {} path does not end at its goal vertex (I2)",
            agent.id
        )));
    }
    for pair in path.moves.windows(2) {
        if !approx_eq(pair[0].t_end, pair[1].t_start) {
            return Err(SolverError::InternalAssertionFailed(format!(
                "agent {} path is not temporally contiguous (I2)",
                agent.id
            )));
        }
    }
    Ok(())
}

/// Runs the high-level constraint-tree search to completion, returning
/// the first conflict-free node's paths, or the reason none was found.
#[instrument(skip_all, fields(num_agents = agents.len()))]
pub fn solve(
    roadmap: &Roadmap,
    agents: &[Agent],
    config: &HighLevelConfig,
    branching: &mut dyn BranchingPolicy,
) -> crate::error::SolverResult<SearchOutcome> {
    validate_input(roadmap, agents)?;

    let mut low_level_expansions = 0usize;
    let empty = ConstraintSet::new();
    let mut root_paths = Vec::with_capacity(agents.len());
    for agent in agents {
        match sipp::plan(roadmap, agent, &empty, &config.sipp, &mut low_level_expansions) {
            SippOutcome::Found(path) => {
                validate_node_invariants(agent, &path)?;
                root_paths.push(path);
            }
            SippOutcome::NoPath => {
                return Ok(SearchOutcome {
                    result: Outcome::NotFound(NoSolutionReason::Infeasible),
                    high_level_expanded: 0,
                    low_level_expansions,
                })
            }
        }
    }

    let mut arena: Vec<HighLevelNode> = Vec::new();
    let mut open: BinaryHeap<QueueEntry> = BinaryHeap::new();

    let root = build_node(roadmap, agents, config, None, 0, empty, root_paths, &mut low_level_expansions);
    open.push(QueueEntry { f: root.cost + root.h, conflict_count: root.analysis.len(), id: 0 });
    arena.push(root);

    let mut high_level_expanded = 0usize;

    while let Some(entry) = open.pop() {
        if let Some(deadline) = config.deadline {
            if Instant::now() >= deadline {
                return Ok(SearchOutcome {
                    result: Outcome::NotFound(NoSolutionReason::Timeout),
                    high_level_expanded,
                    low_level_expansions,
                });
            }
        }
        if let Some(limit) = config.max_high_level_expansions {
            if high_level_expanded >= limit {
                return Ok(SearchOutcome {
                    result: Outcome::NotFound(NoSolutionReason::StepLimit),
                    high_level_expanded,
                    low_level_expansions,
                });
            }
        }
        high_level_expanded += 1;

        // Entries are stale once a cheaper path to the same node's
        // successors has already been explored via a different queue
        // entry; here every node is pushed exactly once, so no staleness
        // check is needed (unlike SIPP's shared-state reopening).
        let node_id = entry.id;
        if arena[node_id].analysis.is_empty() {
            debug!(node = node_id, "conflict-free node found");
            return Ok(SearchOutcome {
                result: Outcome::Found((*arena[node_id].paths).clone()),
                high_level_expanded,
                low_level_expansions,
            });
        }

        let observations: Vec<ConflictObservation> = arena[node_id]
            .analysis
            .iter()
            .enumerate()
            .map(|(i, (c, cls))| ConflictObservation {
                index: i,
                agent_a: c.agent_a,
                agent_b: c.agent_b,
                kind: cls.kind,
                depth: arena[node_id].depth,
                time_to_conflict: c.window.start,
                delta_a: cls.delta_a,
                delta_b: cls.delta_b,
            })
            .collect();
        let chosen = branching.choose(&observations);
        let (conflict, classification) = arena[node_id].analysis[chosen].clone();

        let children = split(roadmap, config, &conflict, &classification);
        for child in children {
            let mut constraints = (*arena[node_id].constraints).clone();
            let mut affected: Vec<usize> = Vec::new();

            if let Some((agent, u, v, t_start)) = child.positive {
                if constraints.add_positive(agent, u, v, t_start).is_err() {
                    continue; // contradicts an inherited positive constraint
                }
                affected.push(agent);
            }
            for (agent, u, v, window) in &child.negatives {
                constraints.add_negative(*agent, *u, *v, *window);
                if !affected.contains(agent) {
                    affected.push(*agent);
                }
            }
            if let Some((agent, u, v, t_start, duration)) = child.propagate_from {
                let propagated =
                    constraints.propagate_positive(roadmap, config.agent_radius, agents.len(), agent, u, v, t_start, duration);
                for p in propagated {
                    if let Constraint::Negative { agent: other, u, v, window } = p {
                        constraints.add_negative(other, u, v, window);
                        if !affected.contains(&other) {
                            affected.push(other);
                        }
                    }
                }
            }

            let Some(new_paths) = replan_affected(
                roadmap,
                agents,
                &constraints,
                &arena[node_id].paths,
                &config.sipp,
                &mut low_level_expansions,
                &affected,
            )?
            else {
                continue; // this branch is infeasible, prune it
            };

            let child_id = arena.len();
            let built = build_node(
                roadmap,
                agents,
                config,
                Some(node_id),
                arena[node_id].depth + 1,
                constraints,
                new_paths,
                &mut low_level_expansions,
            );
            open.push(QueueEntry { f: built.cost + built.h, conflict_count: built.analysis.len(), id: child_id });
            arena.push(built);
        }
    }

    Ok(SearchOutcome {
        result: Outcome::NotFound(NoSolutionReason::Infeasible),
        high_level_expanded,
        low_level_expansions,
    })
}

fn build_node(
    roadmap: &Roadmap,
    agents: &[Agent],
    config: &HighLevelConfig,
    parent: Option<usize>,
    depth: usize,
    constraints: ConstraintSet,
    paths: Vec<Path>,
    low_level_expansions: &mut usize,
) -> HighLevelNode {
    let analysis = analyze_conflicts(roadmap, config, agents, &constraints, &paths, low_level_expansions);
    let cost: f64 = paths.iter().map(Path::finish_time).sum();

    let h = if config.use_cardinal {
        let edges: Vec<CardinalEdge> = analysis
            .iter()
            .filter(|(_, cls)| cls.kind == ConflictKind::Cardinal)
            .map(|(c, cls)| CardinalEdge {
                agent_a: c.agent_a,
                agent_b: c.agent_b,
                weight: cls.delta_a.min(cls.delta_b),
            })
            .collect();
        hvalue::compute(config.hlh_type, &edges)
    } else {
        0.0
    };

    HighLevelNode {
        parent,
        depth,
        constraints: Rc::new(constraints),
        paths: Rc::new(paths),
        cost,
        analysis,
        h,
    }
}

fn analyze_conflicts(
    roadmap: &Roadmap,
    config: &HighLevelConfig,
    agents: &[Agent],
    constraints: &ConstraintSet,
    paths: &[Path],
    low_level_expansions: &mut usize,
) -> Vec<(Conflict, Classification)> {
    let mut conflicts = conflict::detect_all(roadmap, config.agent_radius, paths);

    if config.use_target_symmetry {
        for a in 0..paths.len() {
            for b in 0..paths.len() {
                if a == b {
                    continue;
                }
                if let Some(c) = symmetry::target_conflict(a, agents[a].goal, &paths[a], b, &paths[b]) {
                    conflicts.push(c);
                }
            }
        }
    }

    conflicts
        .into_iter()
        .map(|c| {
            let classification = symmetry::classify(
                roadmap,
                config.agent_radius,
                agents,
                constraints,
                paths,
                &c,
                &config.sipp,
                low_level_expansions,
            );
            (c, classification)
        })
        .collect()
}

struct ChildSpec {
    negatives: Vec<(usize, VertexId, VertexId, Interval)>,
    positive: Option<(usize, VertexId, VertexId, f64)>,
    /// Set on the positive-constraint child of a disjoint split: once the
    /// positive constraint is in place, `solve` calls
    /// [`ConstraintSet::propagate_positive`] with these parameters and
    /// adds the resulting negatives to every other agent.
    propagate_from: Option<(usize, VertexId, VertexId, f64, f64)>,
}

/// The window to forbid on `moved`'s own start times so it no longer
/// collides with `fixed`, per spec.md §4.B/§4.H: the *collision
/// interval*, not the realized overlap window of the two already-
/// colliding moves (those generally differ whenever the two moves have
/// different durations or start times). Falls back to the realized
/// overlap if the geometry kernel finds no interval (degenerate/parallel
/// cases the closed-form solve doesn't represent as one range).
fn negative_window(
    roadmap: &Roadmap,
    radius: f64,
    fixed: &crate::agent::Move,
    moved: &crate::agent::Move,
    realized_overlap: Interval,
) -> Interval {
    geometry::collision_interval(roadmap, radius, fixed, moved.u, moved.v, moved.duration())
        .unwrap_or(realized_overlap)
}

/// Produces the child constraint specs for one chosen conflict: a single
/// strengthened child for a target- or corridor-symmetry conflict, a
/// positive/negative pair under disjoint splitting, or the standard
/// two-way negative split otherwise.
fn split(roadmap: &Roadmap, config: &HighLevelConfig, conflict: &Conflict, classification: &Classification) -> Vec<ChildSpec> {
    if conflict.move_a.duration().is_infinite() {
        // Target symmetry: agent_a is dwelling forever at its goal and
        // cannot be made to avoid it, so only agent_b is constrained.
        return vec![ChildSpec {
            negatives: vec![(conflict.agent_b, conflict.move_b.u, conflict.move_b.v, conflict.window)],
            positive: None,
            propagate_from: None,
        }];
    }

    if config.use_corridor_symmetry {
        if let Some(Constraint::Negative { agent, u, v, window }) =
            symmetry::corridor_constraint(roadmap, conflict, classification)
        {
            return vec![ChildSpec { negatives: vec![(agent, u, v, window)], positive: None, propagate_from: None }];
        }
    }

    if config.use_disjoint_splitting {
        let agent = conflict.agent_a;
        let u = conflict.move_a.u;
        let v = conflict.move_a.v;
        let t_start = conflict.move_a.t_start;
        let duration = conflict.move_a.duration();

        let positive_child = ChildSpec {
            negatives: Vec::new(),
            positive: Some((agent, u, v, t_start)),
            propagate_from: Some((agent, u, v, t_start, duration)),
        };
        let window = negative_window(roadmap, config.agent_radius, &conflict.move_b, &conflict.move_a, conflict.window);
        let negative_child = ChildSpec { negatives: vec![(agent, u, v, window)], positive: None, propagate_from: None };
        return vec![positive_child, negative_child];
    }

    let window_a = negative_window(roadmap, config.agent_radius, &conflict.move_b, &conflict.move_a, conflict.window);
    let window_b = negative_window(roadmap, config.agent_radius, &conflict.move_a, &conflict.move_b, conflict.window);
    vec![
        ChildSpec {
            negatives: vec![(conflict.agent_a, conflict.move_a.u, conflict.move_a.v, window_a)],
            positive: None,
            propagate_from: None,
        },
        ChildSpec {
            negatives: vec![(conflict.agent_b, conflict.move_b.u, conflict.move_b.v, window_b)],
            positive: None,
            propagate_from: None,
        },
    ]
}

fn replan_affected(
    roadmap: &Roadmap,
    agents: &[Agent],
    constraints: &ConstraintSet,
    base_paths: &[Path],
    sipp_config: &SippConfig,
    low_level_expansions: &mut usize,
    affected: &[usize],
) -> crate::error::SolverResult<Option<Vec<Path>>> {
    let mut paths = base_paths.to_vec();
    for &a in affected {
        match sipp::plan(roadmap, &agents[a], constraints, sipp_config, low_level_expansions) {
            SippOutcome::Found(path) => {
                validate_node_invariants(&agents[a], &path)?;
                paths[a] = path;
            }
            SippOutcome::NoPath => return Ok(None),
        }
    }
    Ok(Some(paths))
}
