//! Multi-constraint aggregator: per-agent constraint lists
//! inherited along a constraint-tree path, merged and deduplicated.

use std::collections::HashMap;

use crate::geometry;
use crate::interval::{merge_intervals, Interval};
use crate::roadmap::{Roadmap, VertexId};

/// Either a negative constraint (agent may not *begin* traversing `(u,v)`
/// during `window`) or a positive constraint (agent must traverse `(u,v)`
/// starting exactly at `t_start`).
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Negative {
        agent: usize,
        u: VertexId,
        v: VertexId,
        window: Interval,
    },
    Positive {
        agent: usize,
        u: VertexId,
        v: VertexId,
        t_start: f64,
    },
}

/// The set of constraints active along one root-to-node path of the
/// constraint tree. Cloning is shallow-cheap (`Vec` clones); HLNs inherit
/// by value since constraints only ever grow along the tree, never shrink.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    negative: HashMap<(usize, VertexId, VertexId), Vec<Interval>>,
    positive: HashMap<usize, (VertexId, VertexId, f64)>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a negative constraint, merging it into any existing
    /// adjacent/overlapping interval on the same directed edge for that
    /// agent.
    pub fn add_negative(&mut self, agent: usize, u: VertexId, v: VertexId, window: Interval) {
        let entry = self.negative.entry((agent, u, v)).or_default();
        entry.push(window);
        merge_intervals(entry);
    }

    /// Adds a positive constraint. Returns `Err` if this agent already
    /// has a distinct positive constraint — disjoint splitting never
    /// produces two positive constraints for the same agent along one
    /// root path, so a duplicate here means an infeasible sibling node.
    pub fn add_positive(
        &mut self,
        agent: usize,
        u: VertexId,
        v: VertexId,
        t_start: f64,
    ) -> Result<(), ()> {
        match self.positive.get(&agent) {
            Some(existing) if *existing != (u, v, t_start) => Err(()),
            _ => {
                self.positive.insert(agent, (u, v, t_start));
                Ok(())
            }
        }
    }

    pub fn negative_windows(&self, agent: usize, u: VertexId, v: VertexId) -> &[Interval] {
        self.negative
            .get(&(agent, u, v))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn positive_move(&self, agent: usize, at: VertexId) -> Option<(VertexId, f64)> {
        self.positive
            .get(&agent)
            .filter(|(u, _, _)| *u == at)
            .map(|(_, v, t)| (*v, *t))
    }

    /// Computes the negative constraints that a positive constraint on
    /// `agent`'s move `(u, v, t_start)` (duration `duration`) forces on
    /// every other agent: "equivalent to a negative
    /// constraint on every other agent a' for any move whose collision
    /// interval with this move is non-empty." We check the two moves
    /// that can physically collide with a straight edge traversal: the
    /// same edge, its reverse, and waiting at either endpoint.
    pub fn propagate_positive(
        &self,
        roadmap: &Roadmap,
        radius: f64,
        num_agents: usize,
        agent: usize,
        u: VertexId,
        v: VertexId,
        t_start: f64,
        duration: f64,
    ) -> Vec<Constraint> {
        let fixed = crate::agent::Move {
            agent,
            u,
            v,
            t_start,
            t_end: t_start + duration,
        };

        let mut out = Vec::new();
        for other in 0..num_agents {
            if other == agent {
                continue;
            }
            let templates = [(u, v, duration), (v, u, duration), (u, u, 1.0), (v, v, 1.0)];
            for (ou, ov, odur) in templates {
                if let Some(window) =
                    geometry::collision_interval(roadmap, radius, &fixed, ou, ov, odur)
                {
                    out.push(Constraint::Negative {
                        agent: other,
                        u: ou,
                        v: ov,
                        window,
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_constraints_merge_when_overlapping() {
        let mut cs = ConstraintSet::new();
        cs.add_negative(0, VertexId(1), VertexId(2), Interval::new(0.0, 1.0));
        cs.add_negative(0, VertexId(1), VertexId(2), Interval::new(0.9, 2.0));
        let windows = cs.negative_windows(0, VertexId(1), VertexId(2));
        assert_eq!(windows.len(), 1);
        assert_eq!((windows[0].start, windows[0].end), (0.0, 2.0));
    }

    #[test]
    fn duplicate_distinct_positive_constraint_is_rejected() {
        let mut cs = ConstraintSet::new();
        assert!(cs.add_positive(0, VertexId(1), VertexId(2), 3.0).is_ok());
        assert!(cs.add_positive(0, VertexId(1), VertexId(3), 3.0).is_err());
        assert!(cs.add_positive(0, VertexId(1), VertexId(2), 3.0).is_ok());
    }

    #[test]
    fn positive_move_only_matches_its_vertex() {
        let mut cs = ConstraintSet::new();
        cs.add_positive(0, VertexId(1), VertexId(2), 3.0).unwrap();
        assert_eq!(cs.positive_move(0, VertexId(1)), Some((VertexId(2), 3.0)));
        assert_eq!(cs.positive_move(0, VertexId(2)), None);
        assert_eq!(cs.positive_move(1, VertexId(1)), None);
    }
}
