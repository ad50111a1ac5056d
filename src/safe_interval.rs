//! Safe-interval table: per-vertex and per-edge safe
//! intervals derived from one agent's constraint set.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::constraint::ConstraintSet;
use crate::interval::{complement, Interval};
use crate::roadmap::VertexId;

/// Caches the complement computation per (vertex-or-edge) key so that
/// repeated SIPP expansions against the same constraint set don't redo
/// the interval-list complement each time.
pub struct SafeIntervalTable<'c> {
    constraints: &'c ConstraintSet,
    agent: usize,
    vertex_cache: RefCell<HashMap<VertexId, Vec<Interval>>>,
    edge_cache: RefCell<HashMap<(VertexId, VertexId), Vec<Interval>>>,
}

impl<'c> SafeIntervalTable<'c> {
    pub fn new(constraints: &'c ConstraintSet, agent: usize) -> Self {
        SafeIntervalTable {
            constraints,
            agent,
            vertex_cache: RefCell::new(HashMap::new()),
            edge_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Safe intervals for *being at* `v` — the complement of the windows
    /// during which a wait-move constraint (u == v) forbids occupying it.
    pub fn vertex_safe_intervals(&self, v: VertexId) -> Vec<Interval> {
        if let Some(cached) = self.vertex_cache.borrow().get(&v) {
            return cached.clone();
        }
        let occupied = self.constraints.negative_windows(self.agent, v, v);
        let safe = complement(occupied);
        self.vertex_cache.borrow_mut().insert(v, safe.clone());
        safe
    }

    /// Safe *start* intervals for departing along directed edge `(u, v)`.
    pub fn edge_start_safe_intervals(&self, u: VertexId, v: VertexId) -> Vec<Interval> {
        if let Some(cached) = self.edge_cache.borrow().get(&(u, v)) {
            return cached.clone();
        }
        let occupied = self.constraints.negative_windows(self.agent, u, v);
        let safe = complement(occupied);
        self.edge_cache.borrow_mut().insert((u, v), safe.clone());
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_with_no_constraints_is_safe_forever() {
        let cs = ConstraintSet::new();
        let table = SafeIntervalTable::new(&cs, 0);
        let safe = table.vertex_safe_intervals(VertexId(0));
        assert_eq!(safe.len(), 1);
        assert_eq!(safe[0].start, 0.0);
        assert!(safe[0].end.is_infinite());
    }

    #[test]
    fn vertex_occupied_window_splits_safe_intervals() {
        let mut cs = ConstraintSet::new();
        cs.add_negative(0, VertexId(0), VertexId(0), Interval::new(2.0, 4.0));
        let table = SafeIntervalTable::new(&cs, 0);
        let safe = table.vertex_safe_intervals(VertexId(0));
        assert_eq!(safe.len(), 2);
        assert_eq!((safe[0].start, safe[0].end), (0.0, 2.0));
        assert_eq!(safe[1].start, 4.0);
    }

    #[test]
    fn edge_and_vertex_constraints_are_independent() {
        let mut cs = ConstraintSet::new();
        cs.add_negative(0, VertexId(0), VertexId(1), Interval::new(1.0, 2.0));
        let table = SafeIntervalTable::new(&cs, 0);
        assert_eq!(table.vertex_safe_intervals(VertexId(0)).len(), 1);
        assert_eq!(table.edge_start_safe_intervals(VertexId(0), VertexId(1)).len(), 2);
    }
}
