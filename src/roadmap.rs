use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fs;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// Index of a vertex in a [`Roadmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    to: VertexId,
    duration: f64,
}

/// The weighted, undirected roadmap graph. Vertices carry
/// 2-D coordinates; edge durations are Euclidean distance at unit speed.
/// Immutable after construction: may be shared across runs.
#[derive(Debug, Clone)]
pub struct Roadmap {
    coords: Vec<Point>,
    /// Outgoing neighbors per vertex, kept sorted by destination id. This
    /// ordering is the stable tie-break key used by SIPP.
    adjacency: Vec<Vec<Edge>>,
    heuristic_cache: HashMap<VertexId, Vec<f64>>,
}

impl Roadmap {
    pub fn new(coords: Vec<Point>) -> Self {
        Roadmap {
            adjacency: vec![Vec::new(); coords.len()],
            coords,
            heuristic_cache: HashMap::new(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.coords.len()
    }

    pub fn contains(&self, v: VertexId) -> bool {
        v.0 < self.coords.len()
    }

    pub fn coord(&self, v: VertexId) -> Point {
        self.coords[v.0]
    }

    /// Adds an undirected edge. No two vertices may coincide.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId) -> SolverResult<()> {
        if a.0 >= self.coords.len() || b.0 >= self.coords.len() {
            return Err(SolverError::InvalidInput(format!(
                "edge references out-of-range vertex ({a:?}, {b:?})"
            )));
        }
        if self.coords[a.0].x == self.coords[b.0].x && self.coords[a.0].y == self.coords[b.0].y {
            return Err(SolverError::InvalidInput(format!(
                "vertices {a:?} and {b:?} coincide"
            )));
        }
        let duration = self.coord(a).distance(&self.coord(b));
        self.adjacency[a.0].push(Edge { to: b, duration });
        self.adjacency[b.0].push(Edge { to: a, duration });
        self.adjacency[a.0].sort_by_key(|e| e.to);
        self.adjacency[b.0].sort_by_key(|e| e.to);
        Ok(())
    }

    /// Outgoing neighbors in stable tie-break order.
    pub fn neighbors(&self, v: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.adjacency[v.0].iter().map(|e| e.to)
    }

    pub fn duration(&self, u: VertexId, v: VertexId) -> Option<f64> {
        if u == v {
            return None;
        }
        self.adjacency[u.0]
            .iter()
            .find(|e| e.to == v)
            .map(|e| e.duration)
    }

    pub fn degree(&self, v: VertexId) -> usize {
        self.adjacency[v.0].len()
    }

    /// Straight-line (always admissible, since edges are straight-line
    /// distances) lower bound from `from` to `goal`.
    pub fn straight_line_heuristic(&self, from: VertexId, goal: VertexId) -> f64 {
        self.coord(from).distance(&self.coord(goal))
    }

    /// Precomputes a reverse-Dijkstra shortest-path table from `goal` to
    /// every vertex, so [`Roadmap::heuristic`] returns the graph-shortest
    /// path distance instead of the (also admissible, but weaker)
    /// straight-line bound. Cached per goal.
    pub fn precompute_heuristic(&mut self, goal: VertexId) {
        if self.heuristic_cache.contains_key(&goal) {
            return;
        }
        let mut dist = vec![f64::INFINITY; self.coords.len()];
        dist[goal.0] = 0.0;
        let mut heap = BinaryHeap::new();
        heap.push(Reverse((OrderedFloat(0.0), goal)));

        while let Some(Reverse((OrderedFloat(d), v))) = heap.pop() {
            if d > dist[v.0] {
                continue;
            }
            for edge in &self.adjacency[v.0] {
                let next = d + edge.duration;
                if next < dist[edge.to.0] {
                    dist[edge.to.0] = next;
                    heap.push(Reverse((OrderedFloat(next), edge.to)));
                }
            }
        }

        self.heuristic_cache.insert(goal, dist);
    }

    /// Admissible lower bound on remaining cost from `from` to `goal`.
    /// Uses the precomputed reverse-Dijkstra table when available, else
    /// falls back to the straight-line distance.
    pub fn heuristic(&self, from: VertexId, goal: VertexId) -> f64 {
        match self.heuristic_cache.get(&goal) {
            Some(table) => table[from.0],
            None => self.straight_line_heuristic(from, goal),
        }
    }

    pub fn validate_vertex(&self, v: VertexId) -> SolverResult<()> {
        if !self.contains(v) {
            return Err(SolverError::InvalidInput(format!(
                "vertex {v:?} absent from roadmap"
            )));
        }
        Ok(())
    }

    /// Loads a roadmap from the small vertex/edge XML format used by this
    /// problem family: `<graph><vertex id=".." x=".." y=".." /><edge
    /// u=".." v=".." /></graph>`, following the plain one-struct-per-tag
    /// convention `quick-xml`'s serde integration expects.
    pub fn load(path: &std::path::Path) -> SolverResult<Roadmap> {
        let text = fs::read_to_string(path)
            .map_err(|e| SolverError::InvalidInput(format!("reading roadmap file {path:?}: {e}")))?;
        let xml: RoadmapXml = quick_xml::de::from_str(&text)
            .map_err(|e| SolverError::InvalidInput(format!("parsing roadmap XML {path:?}: {e}")))?;

        let coords = xml.vertex.iter().map(|v| Point { x: v.x, y: v.y }).collect();
        let mut roadmap = Roadmap::new(coords);
        for edge in &xml.edge {
            roadmap.add_edge(VertexId(edge.u), VertexId(edge.v))?;
        }
        Ok(roadmap)
    }
}

#[derive(Debug, Deserialize)]
struct RoadmapXml {
    #[serde(default, rename = "vertex")]
    vertex: Vec<VertexXml>,
    #[serde(default, rename = "edge")]
    edge: Vec<EdgeXml>,
}

#[derive(Debug, Deserialize)]
struct VertexXml {
    #[serde(rename = "@id")]
    #[allow(dead_code)]
    id: usize,
    #[serde(rename = "@x")]
    x: f64,
    #[serde(rename = "@y")]
    y: f64,
}

#[derive(Debug, Deserialize)]
struct EdgeXml {
    #[serde(rename = "@u")]
    u: usize,
    #[serde(rename = "@v")]
    v: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph() -> Roadmap {
        // 0 -- 1 -- 2, unit-length edges.
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
    fn edge_duration_is_euclidean_distance() {
        let rm = line_graph();
        assert_eq!(rm.duration(VertexId(0), VertexId(1)), Some(1.0));
        assert_eq!(rm.duration(VertexId(0), VertexId(2)), None);
    }

    #[test]
    fn reverse_dijkstra_matches_straight_line_on_a_line_graph() {
        let mut rm = line_graph();
        rm.precompute_heuristic(VertexId(2));
        assert_eq!(rm.heuristic(VertexId(0), VertexId(2)), 2.0);
        assert_eq!(
            rm.heuristic(VertexId(0), VertexId(2)),
            rm.straight_line_heuristic(VertexId(0), VertexId(2))
        );
    }

    #[test]
    fn rejects_coincident_vertices() {
        let mut rm = Roadmap::new(vec![Point { x: 0.0, y: 0.0 }, Point { x: 0.0, y: 0.0 }]);
        assert!(rm.add_edge(VertexId(0), VertexId(1)).is_err());
    }

    #[test]
    fn neighbors_are_sorted_for_stable_tie_break() {
        let mut rm = Roadmap::new(vec![
            Point { x: 0.0, y: 0.0 },
            Point { x: 1.0, y: 0.0 },
            Point { x: -1.0, y: 0.0 },
        ]);
        rm.add_edge(VertexId(0), VertexId(1)).unwrap();
        rm.add_edge(VertexId(0), VertexId(2)).unwrap();
        let ns: Vec<_> = rm.neighbors(VertexId(0)).collect();
        assert_eq!(ns, vec![VertexId(1), VertexId(2)]);
    }
}
