//! Branching-policy interface: selects which conflict in
//! the current high-level node to split on.

use crate::symmetry::ConflictKind;

/// Fixed-length, serialization-friendly view of one conflict, handed to a
/// branching policy so an external scorer (e.g. a learned policy) can
/// consume it without depending on the solver's internal types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictObservation {
    pub index: usize,
    pub agent_a: usize,
    pub agent_b: usize,
    pub kind: ConflictKind,
    pub depth: usize,
    pub time_to_conflict: f64,
    pub delta_a: f64,
    pub delta_b: f64,
}

/// Abstract scorer consumed by the high-level search. The core never
/// assumes the scorer is deterministic; it only requires the returned
/// index to be in `[0, observations.len())`.
pub trait BranchingPolicy {
    fn choose(&mut self, observations: &[ConflictObservation]) -> usize;
}

/// Deterministic default: cardinal first, then semi-cardinal, then
/// earliest time-to-conflict, then lowest agent-id tuple. Set
/// `prioritize_cardinal` to `false` to fall back to earliest-conflict
/// selection regardless of classification (the `use_cardinal` config
/// flag).
#[derive(Debug, Clone, Copy)]
pub struct HeuristicBranching {
    pub prioritize_cardinal: bool,
}

impl Default for HeuristicBranching {
    fn default() -> Self {
        HeuristicBranching { prioritize_cardinal: true }
    }
}

impl BranchingPolicy for HeuristicBranching {
    fn choose(&mut self, observations: &[ConflictObservation]) -> usize {
        observations
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let rank_a = if self.prioritize_cardinal { rank(a.kind) } else { 0 };
                let rank_b = if self.prioritize_cardinal { rank(b.kind) } else { 0 };
                rank_a
                    .cmp(&rank_b)
                    .then(
                        a.time_to_conflict
                            .partial_cmp(&b.time_to_conflict)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
                    .then((a.agent_a, a.agent_b).cmp(&(b.agent_a, b.agent_b)))
            })
            .map(|(i, _)| i)
            .expect("branching is never called with an empty conflict list")
    }
}

fn rank(kind: ConflictKind) -> u8 {
    match kind {
        ConflictKind::Cardinal => 0,
        ConflictKind::SemiCardinal => 1,
        ConflictKind::NonCardinal => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(index: usize, agent_a: usize, agent_b: usize, kind: ConflictKind, t: f64) -> ConflictObservation {
        ConflictObservation {
            index,
            agent_a,
            agent_b,
            kind,
            depth: 0,
            time_to_conflict: t,
            delta_a: 0.0,
            delta_b: 0.0,
        }
    }

    #[test]
    fn prefers_cardinal_over_earlier_non_cardinal() {
        let observations = vec![
            obs(0, 0, 1, ConflictKind::NonCardinal, 0.1),
            obs(1, 2, 3, ConflictKind::Cardinal, 5.0),
        ];
        let mut policy = HeuristicBranching::default();
        assert_eq!(policy.choose(&observations), 1);
    }

    #[test]
    fn falls_back_to_earliest_time_when_cardinal_disabled() {
        let observations = vec![
            obs(0, 0, 1, ConflictKind::NonCardinal, 0.1),
            obs(1, 2, 3, ConflictKind::Cardinal, 5.0),
        ];
        let mut policy = HeuristicBranching { prioritize_cardinal: false };
        assert_eq!(policy.choose(&observations), 0);
    }

    #[test]
    fn ties_break_on_agent_id_tuple() {
        let observations = vec![
            obs(0, 3, 4, ConflictKind::Cardinal, 1.0),
            obs(1, 1, 2, ConflictKind::Cardinal, 1.0),
        ];
        let mut policy = HeuristicBranching::default();
        assert_eq!(policy.choose(&observations), 1);
    }
}
