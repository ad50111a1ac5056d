//! SIPP low-level planner: minimum-duration timed path for
//! one agent over safe intervals, subject to a constraint set.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, instrument, trace};

use crate::agent::{Agent, Move, Path};
use crate::constraint::ConstraintSet;
use crate::interval::Interval;
use crate::numeric::{approx_ge, approx_lt, EPS};
use crate::roadmap::{Roadmap, VertexId};
use crate::safe_interval::SafeIntervalTable;

/// Result of a low-level search. `NoPath` is not an error:
/// it is the ordinary signal that the high-level search should prune or
/// retry with different constraints.
#[derive(Debug, Clone)]
pub enum SippOutcome {
    Found(Path),
    NoPath,
}

/// Deduplication/rounding granularity for the open-list state key,
/// mirroring caller-specified precision `π`. Our interval
/// arithmetic is closed-form (the geometry kernel already produces exact
/// collision-interval boundaries), so `precision` is not used for
/// root-finding; it is used to merge near-duplicate open-list states
/// that differ only by floating-point noise at an interval boundary.
#[derive(Debug, Clone, Copy)]
pub struct SippConfig {
    pub precision: f64,
    pub deadline: Option<Instant>,
}

impl Default for SippConfig {
    fn default() -> Self {
        SippConfig {
            precision: 1e-6,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StateKey {
    vertex: VertexId,
    interval_start_rounded: i64,
}

fn round_to(value: f64, precision: f64) -> i64 {
    if value.is_infinite() {
        return i64::MAX;
    }
    let p = if precision > 0.0 { precision } else { EPS };
    (value / p).round() as i64
}

#[derive(Debug, Clone)]
struct SearchNode {
    key: StateKey,
    vertex: VertexId,
    interval: Interval,
    interval_rank: usize,
    neighbor_rank: usize,
    g: f64,
    f: f64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f
            && self.interval_rank == other.interval_rank
            && self.neighbor_rank == other.neighbor_rank
            && self.vertex == other.vertex
    }
}
impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse the natural order so the
        // smallest f comes out first, then break ties: smallest
        // destination interval index, then smallest
        // neighbor index, then vertex id for full determinism.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.interval_rank.cmp(&self.interval_rank))
            .then_with(|| other.neighbor_rank.cmp(&self.neighbor_rank))
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}
impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
struct Parent {
    from_vertex: VertexId,
    from_key: StateKey,
    depart_time: f64,
}

/// Runs SIPP for `agent` from `agent.start` to `agent.goal`, subject to
/// `constraints`. `low_level_expansions` accumulates the number of nodes
/// popped, for the caller's low-level expansion counter.
#[instrument(skip_all, fields(agent = agent.id, start = ?agent.start, goal = ?agent.goal), level = "debug")]
pub fn plan(
    roadmap: &Roadmap,
    agent: &Agent,
    constraints: &ConstraintSet,
    config: &SippConfig,
    low_level_expansions: &mut usize,
) -> SippOutcome {
    let table = SafeIntervalTable::new(constraints, agent.id);

    let start_intervals = table.vertex_safe_intervals(agent.start);
    let Some((start_rank, start_interval)) = start_intervals
        .iter()
        .enumerate()
        .find(|(_, iv)| iv.contains(0.0))
    else {
        debug!("start vertex is not safe at t=0");
        return SippOutcome::NoPath;
    };

    let mut open: BinaryHeap<SearchNode> = BinaryHeap::new();
    let mut best_g: HashMap<StateKey, f64> = HashMap::new();
    let mut parent: HashMap<StateKey, Parent> = HashMap::new();
    let mut closed: HashSet<StateKey> = HashSet::new();

    let start_key = StateKey {
        vertex: agent.start,
        interval_start_rounded: round_to(start_interval.start, config.precision),
    };
    best_g.insert(start_key, 0.0);
    open.push(SearchNode {
        key: start_key,
        vertex: agent.start,
        interval: *start_interval,
        interval_rank: start_rank,
        neighbor_rank: 0,
        g: 0.0,
        f: roadmap.heuristic(agent.start, agent.goal),
    });

    while let Some(current) = open.pop() {
        if let Some(deadline) = config.deadline {
            if Instant::now() >= deadline {
                debug!("SIPP deadline exceeded");
                return SippOutcome::NoPath;
            }
        }

        if current.g > *best_g.get(&current.key).unwrap_or(&f64::INFINITY) + EPS {
            continue; // A better path to this state was already found.
        }
        if !closed.insert(current.key) {
            continue;
        }
        *low_level_expansions += 1;
        trace!(vertex = ?current.vertex, g = current.g, "expand");

        if current.vertex == agent.goal && current.interval.end.is_infinite() {
            return SippOutcome::Found(reconstruct(agent, &parent, &best_g, current.key, current.g));
        }

        // A positive constraint at this vertex restricts successors to
        // exactly the one mandated move, used only under
        // disjoint splitting.
        if let Some((dest, forced_start)) = constraints.positive_move(agent.id, current.vertex) {
            if approx_ge(forced_start, current.interval.start) && approx_lt(forced_start, current.interval.end) {
                if let Some(duration) = roadmap.duration(current.vertex, dest) {
                    expand_successors(
                        roadmap,
                        &table,
                        &mut open,
                        &mut best_g,
                        &mut parent,
                        config,
                        agent.goal,
                        current.key,
                        current.vertex,
                        current.interval,
                        dest,
                        duration,
                        Some(forced_start),
                        0,
                    );
                }
            }
            continue;
        }

        for (neighbor_rank, w) in roadmap.neighbors(current.vertex).enumerate() {
            let Some(duration) = roadmap.duration(current.vertex, w) else {
                continue;
            };
            expand_successors(
                roadmap,
                &table,
                &mut open,
                &mut best_g,
                &mut parent,
                config,
                agent.goal,
                current.key,
                current.vertex,
                current.interval,
                w,
                duration,
                None,
                neighbor_rank,
            );
        }
    }

    SippOutcome::NoPath
}

#[allow(clippy::too_many_arguments)]
fn expand_successors(
    roadmap: &Roadmap,
    table: &SafeIntervalTable,
    open: &mut BinaryHeap<SearchNode>,
    best_g: &mut HashMap<StateKey, f64>,
    parent: &mut HashMap<StateKey, Parent>,
    config: &SippConfig,
    goal: VertexId,
    from_key: StateKey,
    from_vertex: VertexId,
    from_interval: Interval,
    to: VertexId,
    duration: f64,
    forced_start: Option<f64>,
    neighbor_rank: usize,
) {
    let edge_starts = table.edge_start_safe_intervals(from_vertex, to);
    let dest_intervals = table.vertex_safe_intervals(to);

    for (interval_rank, dest_interval) in dest_intervals.iter().enumerate() {
        let Some(t_dep) =
            earliest_feasible_departure(from_interval, &edge_starts, *dest_interval, duration, forced_start)
        else {
            continue;
        };
        let arrival = t_dep + duration;

        let successor_key = StateKey {
            vertex: to,
            interval_start_rounded: round_to(dest_interval.start, config.precision),
        };
        let improved = arrival < *best_g.get(&successor_key).unwrap_or(&f64::INFINITY) - EPS;
        if !improved {
            continue;
        }
        best_g.insert(successor_key, arrival);
        parent.insert(
            successor_key,
            Parent {
                from_vertex,
                from_key,
                depart_time: t_dep,
            },
        );
        open.push(SearchNode {
            key: successor_key,
            vertex: to,
            interval: *dest_interval,
            interval_rank,
            neighbor_rank,
            g: arrival,
            f: arrival + roadmap.heuristic(to, goal),
        });
    }
}

/// Earliest `t_dep` such that `t_dep` lies in `from_interval` and in some
/// edge-start-safe sub-range, and `t_dep + duration` lies in
/// `dest_interval`. When `forced_start` is `Some`, only that exact
/// departure time is considered (positive constraint).
fn earliest_feasible_departure(
    from_interval: Interval,
    edge_starts: &[Interval],
    dest_interval: Interval,
    duration: f64,
    forced_start: Option<f64>,
) -> Option<f64> {
    if let Some(t) = forced_start {
        if !contains_closed(from_interval, t) || !contains_closed(dest_interval, t + duration) {
            return None;
        }
        return Some(t);
    }

    let arrival_window = Interval::new(
        dest_interval.start - duration,
        if dest_interval.end.is_infinite() {
            f64::INFINITY
        } else {
            dest_interval.end - duration
        },
    );

    let mut best: Option<f64> = None;
    for edge_window in edge_starts {
        if let Some(range) = from_interval
            .intersect(edge_window)
            .and_then(|r| r.intersect(&arrival_window))
        {
            best = Some(match best {
                Some(b) if b <= range.start => b,
                _ => range.start,
            });
        }
    }
    best
}

fn contains_closed(interval: Interval, t: f64) -> bool {
    interval.contains(t) || (t - interval.start).abs() <= EPS || (interval.end.is_finite() && (t - interval.end).abs() <= EPS)
}

/// Walks the parent chain from the goal state back to the root, emitting
/// travel moves and inserting wait moves wherever a successor's earliest
/// departure time exceeds its predecessor's arrival time at that vertex.
fn reconstruct(
    agent: &Agent,
    parent: &HashMap<StateKey, Parent>,
    best_g: &HashMap<StateKey, f64>,
    mut key: StateKey,
    mut arrival_time: f64,
) -> Path {
    let mut moves = Vec::new();

    while let Some(link) = parent.get(&key) {
        let arrival_at_from = *best_g.get(&link.from_key).unwrap_or(&0.0);
        if link.depart_time > arrival_at_from + EPS {
            moves.push(Move {
                agent: agent.id,
                u: link.from_vertex,
                v: link.from_vertex,
                t_start: arrival_at_from,
                t_end: link.depart_time,
            });
        }
        moves.push(Move {
            agent: agent.id,
            u: link.from_vertex,
            v: key.vertex,
            t_start: link.depart_time,
            t_end: arrival_time,
        });

        arrival_time = arrival_at_from;
        key = link.from_key;
    }

    moves.reverse();
    Path { moves }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::Point;

    fn line_roadmap() -> Roadmap {
        let mut rm = Roadmap::new(vec![
            Point { x: 0.0, y: 0.0 },
            Point { x: 1.0, y: 0.0 },
            Point { x: 2.0, y: 0.0 },
        ]);
        rm.add_edge(VertexId(0), VertexId(1)).unwrap();
        rm.add_edge(VertexId(1), VertexId(2)).unwrap();
        rm
    }

    #[test]
    fn plans_a_direct_path_with_no_constraints() {
        let rm = line_roadmap();
        let agent = Agent { id: 0, start: VertexId(0), goal: VertexId(2) };
        let cs = ConstraintSet::new();
        let mut expansions = 0;
        match plan(&rm, &agent, &cs, &SippConfig::default(), &mut expansions) {
            SippOutcome::Found(path) => {
                assert_eq!(path.moves.len(), 2);
                assert_eq!(path.moves[0].t_start, 0.0);
                assert_eq!(path.moves.last().unwrap().t_end, 2.0);
            }
            SippOutcome::NoPath => panic!("expected a path"),
        }
    }

    #[test]
    fn waits_out_a_negative_constraint_on_the_first_edge() {
        let rm = line_roadmap();
        let agent = Agent { id: 0, start: VertexId(0), goal: VertexId(2) };
        let mut cs = ConstraintSet::new();
        cs.add_negative(0, VertexId(0), VertexId(1), Interval::new(0.0, 3.0));
        let mut expansions = 0;
        match plan(&rm, &agent, &cs, &SippConfig::default(), &mut expansions) {
            SippOutcome::Found(path) => {
                let first_travel = path.moves.iter().find(|m| m.u != m.v).unwrap();
                assert!(first_travel.t_start >= 3.0 - EPS);
            }
            SippOutcome::NoPath => panic!("expected a path via waiting"),
        }
    }

    #[test]
    fn unreachable_goal_reports_no_path() {
        let rm = Roadmap::new(vec![Point { x: 0.0, y: 0.0 }, Point { x: 5.0, y: 5.0 }]);
        let agent = Agent { id: 0, start: VertexId(0), goal: VertexId(1) };
        let cs = ConstraintSet::new();
        let mut expansions = 0;
        assert!(matches!(
            plan(&rm, &agent, &cs, &SippConfig::default(), &mut expansions),
            SippOutcome::NoPath
        ));
    }

    #[test]
    fn permanently_blocked_start_vertex_reports_no_path() {
        let rm = line_roadmap();
        let agent = Agent { id: 0, start: VertexId(0), goal: VertexId(2) };
        let mut cs = ConstraintSet::new();
        cs.add_negative(0, VertexId(0), VertexId(0), Interval::new(0.0, f64::INFINITY));
        let mut expansions = 0;
        assert!(matches!(
            plan(&rm, &agent, &cs, &SippConfig::default(), &mut expansions),
            SippOutcome::NoPath
        ));
    }
}
