//! CCBS: Continuous Conflict-Based Search over a weighted roadmap graph.
//!
//! Two-level MAPF solver: [`highlevel`] runs the constraint-tree search,
//! delegating each per-agent replan to [`sipp`]'s safe-interval planner.

pub mod agent;
pub mod branching;
pub mod conflict;
pub mod config;
pub mod constraint;
pub mod error;
pub mod geometry;
pub mod highlevel;
pub mod hvalue;
pub mod interval;
pub mod numeric;
pub mod roadmap;
pub mod safe_interval;
pub mod sipp;
pub mod solution;
pub mod stats;
pub mod symmetry;
