//! Symmetry / cardinal analysis: classifies a conflict by
//! replanning each participant with its colliding move forbidden, and
//! detects the corridor and target symmetries that let the high level
//! emit a stronger constraint than a single forbidden move.

use crate::agent::{Agent, Move, Path};
use crate::conflict::Conflict;
use crate::constraint::{Constraint, ConstraintSet};
use crate::geometry;
use crate::interval::Interval;
use crate::numeric::approx_gt;
use crate::roadmap::{Roadmap, VertexId};
use crate::sipp::{self, SippConfig, SippOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Cardinal,
    SemiCardinal,
    NonCardinal,
}

#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub kind: ConflictKind,
    pub delta_a: f64,
    pub delta_b: f64,
}

/// Replans `conflict.agent_a` under a constraint forbidding `move_a`, and
/// `conflict.agent_b` under one forbidding `move_b`, then classifies by
/// the resulting cost deltas: cardinal if both increase, semi-cardinal if
/// exactly one does, non-cardinal otherwise.
#[allow(clippy::too_many_arguments)]
pub fn classify(
    roadmap: &Roadmap,
    radius: f64,
    agents: &[Agent],
    constraints: &ConstraintSet,
    paths: &[Path],
    conflict: &Conflict,
    sipp_config: &SippConfig,
    low_level_expansions: &mut usize,
) -> Classification {
    let delta_a = replanned_delta(
        roadmap,
        radius,
        agents,
        constraints,
        paths,
        sipp_config,
        low_level_expansions,
        conflict.agent_a,
        &conflict.move_b,
        &conflict.move_a,
        conflict.window,
    );
    let delta_b = replanned_delta(
        roadmap,
        radius,
        agents,
        constraints,
        paths,
        sipp_config,
        low_level_expansions,
        conflict.agent_b,
        &conflict.move_a,
        &conflict.move_b,
        conflict.window,
    );

    let kind = match (approx_gt(delta_a, 0.0), approx_gt(delta_b, 0.0)) {
        (true, true) => ConflictKind::Cardinal,
        (false, false) => ConflictKind::NonCardinal,
        _ => ConflictKind::SemiCardinal,
    };

    Classification { kind, delta_a, delta_b }
}

/// Replans `agent_id` under a trial negative constraint forbidding its own
/// colliding move (`own_move`), returning the resulting cost delta (or
/// `+inf` if no path remains). The forbidden window is the true collision
/// interval between `own_move` and `fixed_other` (spec.md §4.B), not their
/// realized time-overlap, which is generally narrower or wider; falls back
/// to `realized_overlap` if the geometry kernel can't express the result
/// as one interval.
#[allow(clippy::too_many_arguments)]
fn replanned_delta(
    roadmap: &Roadmap,
    radius: f64,
    agents: &[Agent],
    constraints: &ConstraintSet,
    paths: &[Path],
    sipp_config: &SippConfig,
    low_level_expansions: &mut usize,
    agent_id: usize,
    fixed_other: &Move,
    own_move: &Move,
    realized_overlap: Interval,
) -> f64 {
    let window = geometry::collision_interval(roadmap, radius, fixed_other, own_move.u, own_move.v, own_move.duration())
        .unwrap_or(realized_overlap);

    let mut trial = constraints.clone();
    trial.add_negative(agent_id, own_move.u, own_move.v, window);

    let original_duration = paths[agent_id].finish_time();
    match sipp::plan(roadmap, &agents[agent_id], &trial, sipp_config, low_level_expansions) {
        SippOutcome::Found(path) => (path.finish_time() - original_duration).max(0.0),
        SippOutcome::NoPath => f64::INFINITY,
    }
}

fn is_corridor_vertex(roadmap: &Roadmap, v: VertexId) -> bool {
    roadmap.degree(v) == 2
}

/// Walks a degree-2 chain starting at `from`, heading toward `towards`,
/// until a vertex whose degree isn't 2 (the corridor boundary), returning
/// that boundary vertex and the cumulative traversal duration.
fn walk_corridor(roadmap: &Roadmap, from: VertexId, towards: VertexId) -> (VertexId, f64) {
    let mut prev = from;
    let mut current = towards;
    let mut total = roadmap.duration(from, towards).unwrap_or(0.0);
    while is_corridor_vertex(roadmap, current) {
        let Some(next) = roadmap.neighbors(current).find(|&n| n != prev) else {
            break;
        };
        total += roadmap.duration(current, next).unwrap_or(0.0);
        prev = current;
        current = next;
    }
    (current, total)
}

/// If `conflict`'s two moves traverse the same corridor (a chain of
/// degree-2 vertices) in opposing directions, returns a range constraint
/// forbidding the agent with the smaller replanning delta (the "loser",
/// ties favor `agent_b`) from entering the corridor for the full
/// traversal window, rather than just the single colliding move.
pub fn corridor_constraint(
    roadmap: &Roadmap,
    conflict: &Conflict,
    classification: &Classification,
) -> Option<Constraint> {
    let move_a = conflict.move_a;
    let move_b = conflict.move_b;
    if move_a.is_wait() || move_b.is_wait() {
        return None;
    }
    if !(is_corridor_vertex(roadmap, move_a.u) && is_corridor_vertex(roadmap, move_a.v)) {
        return None;
    }

    let (boundary_a, len_a) = walk_corridor(roadmap, move_a.u, move_a.v);
    let (boundary_b, len_b) = walk_corridor(roadmap, move_b.u, move_b.v);
    // A true opposing-direction corridor crossing: walking from each
    // move's origin toward its destination reaches the other move's
    // origin vertex.
    if boundary_a != move_b.u || boundary_b != move_a.u {
        return None;
    }

    let (loser_agent, entry_u, entry_v, window_len) = if classification.delta_a > classification.delta_b {
        (conflict.agent_b, move_b.u, move_b.v, len_b)
    } else {
        (conflict.agent_a, move_a.u, move_a.v, len_a)
    };

    Some(Constraint::Negative {
        agent: loser_agent,
        u: entry_u,
        v: entry_v,
        window: Interval::new(conflict.window.start, conflict.window.start + window_len),
    })
}

/// If `goal` (agent `goal_agent`'s destination) lies on `other_agent`'s
/// remaining path after `goal_agent` has already arrived and started
/// dwelling there forever, returns a synthetic conflict pairing the
/// (infinite) dwell against the crossing move — the high level resolves
/// it with a single negative constraint on `other_agent` alone, since
/// `goal_agent` cannot be made to avoid its own goal.
pub fn target_conflict(
    goal_agent: usize,
    goal: VertexId,
    goal_path: &Path,
    other_agent: usize,
    other_path: &Path,
) -> Option<Conflict> {
    let arrival = goal_path.finish_time();
    for mv in &other_path.moves {
        if mv.t_end <= arrival {
            continue;
        }
        if mv.v == goal || mv.u == goal {
            let dwell = crate::agent::Move {
                agent: goal_agent,
                u: goal,
                v: goal,
                t_start: arrival,
                t_end: f64::INFINITY,
            };
            return Some(Conflict {
                agent_a: goal_agent,
                agent_b: other_agent,
                move_a: dwell,
                move_b: *mv,
                window: Interval::forever_from(arrival.max(mv.t_start)),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, Move};
    use crate::roadmap::Point;

    fn line_roadmap() -> Roadmap {
        // 0 -- 1 -- 2 -- 3 -- 4, a 5-vertex corridor of degree-2 interior
        // vertices (1, 2, 3).
        let mut rm = Roadmap::new(vec![
            Point { x: 0.0, y: 0.0 },
            Point { x: 1.0, y: 0.0 },
            Point { x: 2.0, y: 0.0 },
            Point { x: 3.0, y: 0.0 },
            Point { x: 4.0, y: 0.0 },
        ]);
        for i in 0..4 {
            rm.add_edge(VertexId(i), VertexId(i + 1)).unwrap();
        }
        rm
    }

    #[test]
    fn classify_cardinal_when_both_sides_must_detour() {
        // Two vertices connected by a single edge: a head-on swap forces
        // both sides to pay a strictly positive delta to avoid it.
        let mut rm = Roadmap::new(vec![Point { x: 0.0, y: 0.0 }, Point { x: 1.0, y: 0.0 }]);
        rm.add_edge(VertexId(0), VertexId(1)).unwrap();
        let agents = vec![
            Agent { id: 0, start: VertexId(0), goal: VertexId(1) },
            Agent { id: 1, start: VertexId(1), goal: VertexId(0) },
        ];
        let paths = vec![
            Path { moves: vec![Move { agent: 0, u: VertexId(0), v: VertexId(1), t_start: 0.0, t_end: 1.0 }] },
            Path { moves: vec![Move { agent: 1, u: VertexId(1), v: VertexId(0), t_start: 0.0, t_end: 1.0 }] },
        ];
        let conflict = Conflict {
            agent_a: 0,
            agent_b: 1,
            move_a: paths[0].moves[0],
            move_b: paths[1].moves[0],
            window: Interval::new(0.0, 1.0),
        };
        let cs = ConstraintSet::new();
        let mut expansions = 0;
        let classification = classify(&rm, 0.4, &agents, &cs, &paths, &conflict, &SippConfig::default(), &mut expansions);
        assert_eq!(classification.kind, ConflictKind::Cardinal);
        assert!(classification.delta_a > 0.0);
        assert!(classification.delta_b > 0.0);
    }

    #[test]
    fn corridor_constraint_detects_opposing_crossing() {
        let rm = line_roadmap();
        let move_a = Move { agent: 0, u: VertexId(0), v: VertexId(1), t_start: 0.0, t_end: 1.0 };
        let move_b = Move { agent: 1, u: VertexId(4), v: VertexId(3), t_start: 0.0, t_end: 1.0 };
        let conflict = Conflict {
            agent_a: 0,
            agent_b: 1,
            move_a,
            move_b,
            window: Interval::new(0.0, 1.0),
        };
        let classification = Classification { kind: ConflictKind::Cardinal, delta_a: 1.0, delta_b: 1.0 };
        let constraint = corridor_constraint(&rm, &conflict, &classification);
        assert!(constraint.is_some());
        if let Some(Constraint::Negative { window, .. }) = constraint {
            assert_eq!(window.duration(), 4.0);
        }
    }

    #[test]
    fn target_conflict_found_when_other_crosses_after_arrival() {
        let goal_path = Path {
            moves: vec![Move { agent: 0, u: VertexId(0), v: VertexId(2), t_start: 0.0, t_end: 2.0 }],
        };
        let other_path = Path {
            moves: vec![Move { agent: 1, u: VertexId(3), v: VertexId(2), t_start: 3.0, t_end: 4.0 }],
        };
        let found = target_conflict(0, VertexId(2), &goal_path, 1, &other_path);
        assert!(found.is_some());
    }

    #[test]
    fn no_target_conflict_when_crossing_happens_before_arrival() {
        let goal_path = Path {
            moves: vec![Move { agent: 0, u: VertexId(0), v: VertexId(2), t_start: 5.0, t_end: 7.0 }],
        };
        let other_path = Path {
            moves: vec![Move { agent: 1, u: VertexId(3), v: VertexId(2), t_start: 0.0, t_end: 1.0 }],
        };
        assert!(target_conflict(0, VertexId(2), &goal_path, 1, &other_path).is_none());
    }

    #[test]
    fn target_conflict_found_when_other_departs_the_goal_without_stopping() {
        // B passes straight through vertex 2 (A's goal) without waiting:
        // one move arrives exactly as A settles, the next departs.
        let goal_path = Path {
            moves: vec![Move { agent: 0, u: VertexId(0), v: VertexId(2), t_start: 0.0, t_end: 2.0 }],
        };
        let other_path = Path {
            moves: vec![
                Move { agent: 1, u: VertexId(3), v: VertexId(2), t_start: 1.0, t_end: 2.0 },
                Move { agent: 1, u: VertexId(2), v: VertexId(1), t_start: 2.0, t_end: 3.0 },
            ],
        };
        let found = target_conflict(0, VertexId(2), &goal_path, 1, &other_path);
        assert!(found.is_some());
    }
}
