//! Conflict detection: scanning a set of per-agent paths
//! for the first, or all, pairwise collisions.

use crate::agent::{Move, Path};
use crate::geometry;
use crate::interval::Interval;
use crate::numeric::approx_lt;
use crate::roadmap::Roadmap;

/// A detected collision between two agents' moves, with the time window
/// during which it holds (used to build the negative constraint that
/// forbids it).
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub agent_a: usize,
    pub agent_b: usize,
    pub move_a: Move,
    pub move_b: Move,
    pub window: Interval,
}

/// Returns every pairwise conflict across all agents' paths, scanning
/// move-by-move in temporal order. The high-level search always needs the
/// full set, since cardinal/semi-cardinal classification and the h-value
/// both look past the single earliest conflict.
pub fn detect_all(roadmap: &Roadmap, radius: f64, paths: &[Path]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for a in 0..paths.len() {
        for b in (a + 1)..paths.len() {
            conflicts.extend(conflicts_between(roadmap, radius, a, &paths[a], b, &paths[b]));
        }
    }
    conflicts
}

/// Returns the earliest (by conflict-window start) conflict across all
/// agent pairs, or `None` if the paths are collision-free. Offered as a
/// cheaper alternative to [`detect_all`] for callers that only need to
/// know whether a set of paths is conflict-free at all, or want the
/// single earliest conflict without the rest.
pub fn detect_earliest(roadmap: &Roadmap, radius: f64, paths: &[Path]) -> Option<Conflict> {
    let mut earliest: Option<Conflict> = None;
    for a in 0..paths.len() {
        for b in (a + 1)..paths.len() {
            for conflict in conflicts_between(roadmap, radius, a, &paths[a], b, &paths[b]) {
                let better = match &earliest {
                    None => true,
                    Some(best) => approx_lt(conflict.window.start, best.window.start),
                };
                if better {
                    earliest = Some(conflict);
                }
            }
        }
    }
    earliest
}

fn conflicts_between(
    roadmap: &Roadmap,
    radius: f64,
    agent_a: usize,
    path_a: &Path,
    agent_b: usize,
    path_b: &Path,
) -> Vec<Conflict> {
    let mut out = Vec::new();
    for move_a in &path_a.moves {
        for move_b in &path_b.moves {
            if !approx_lt(move_a.t_start, move_b.t_end) || !approx_lt(move_b.t_start, move_a.t_end) {
                continue; // no temporal overlap at all, skip the exact check
            }
            if geometry::collides(roadmap, radius, move_a, move_b) {
                let window = Interval::new(
                    move_a.t_start.max(move_b.t_start),
                    move_a.t_end.min(move_b.t_end),
                );
                out.push(Conflict {
                    agent_a,
                    agent_b,
                    move_a: *move_a,
                    move_b: *move_b,
                    window,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::{Point, VertexId};

    fn two_vertex_roadmap() -> Roadmap {
        let mut rm = Roadmap::new(vec![Point { x: 0.0, y: 0.0 }, Point { x: 1.0, y: 0.0 }]);
        rm.add_edge(VertexId(0), VertexId(1)).unwrap();
        rm
    }

    #[test]
    fn detects_head_on_swap_as_a_conflict() {
        let rm = two_vertex_roadmap();
        let path_a = Path {
            moves: vec![Move { agent: 0, u: VertexId(0), v: VertexId(1), t_start: 0.0, t_end: 1.0 }],
        };
        let path_b = Path {
            moves: vec![Move { agent: 1, u: VertexId(1), v: VertexId(0), t_start: 0.0, t_end: 1.0 }],
        };
        let found = detect_earliest(&rm, 0.4, &[path_a, path_b]);
        assert!(found.is_some());
        let conflict = found.unwrap();
        assert_eq!((conflict.agent_a, conflict.agent_b), (0, 1));
    }

    #[test]
    fn no_conflict_when_paths_never_overlap_in_time() {
        let rm = two_vertex_roadmap();
        let path_a = Path {
            moves: vec![Move { agent: 0, u: VertexId(0), v: VertexId(1), t_start: 0.0, t_end: 1.0 }],
        };
        let path_b = Path {
            moves: vec![Move { agent: 1, u: VertexId(1), v: VertexId(0), t_start: 5.0, t_end: 6.0 }],
        };
        assert!(detect_earliest(&rm, 0.4, &[path_a, path_b]).is_none());
    }

    #[test]
    fn detect_all_finds_every_pairwise_conflict() {
        let rm = two_vertex_roadmap();
        let a = Path {
            moves: vec![Move { agent: 0, u: VertexId(0), v: VertexId(1), t_start: 0.0, t_end: 1.0 }],
        };
        let b = Path {
            moves: vec![Move { agent: 1, u: VertexId(1), v: VertexId(0), t_start: 0.0, t_end: 1.0 }],
        };
        let c = Path {
            moves: vec![Move { agent: 2, u: VertexId(1), v: VertexId(0), t_start: 0.0, t_end: 1.0 }],
        };
        let conflicts = detect_all(&rm, 0.4, &[a, b, c]);
        // agent 0 conflicts with both 1 and 2 (head-on); 1 and 2 also
        // conflict with each other, since they occupy the same edge at
        // the same time with zero separation.
        assert_eq!(conflicts.len(), 3);
    }
}
