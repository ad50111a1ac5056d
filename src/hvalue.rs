//! h-value solver: an admissible lower bound on the extra
//! cost still owed by unresolved cardinal conflicts in a high-level node,
//! derived from the cardinal-conflict graph.

use std::collections::HashMap;

/// One edge of the cardinal-conflict graph: two agents that cannot both
/// keep their current paths, weighted by the smaller of their two
/// replanning deltas (the provable extra cost this conflict forces).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardinalEdge {
    pub agent_a: usize,
    pub agent_b: usize,
    pub weight: f64,
}

/// Which h-value strategy to run, selected by the `hlh_type` CLI flag:
/// 0 disables it, 1 solves the LP relaxation of minimum
/// weighted vertex cover, 2 uses a cheaper greedy bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlhType {
    None,
    LinearProgram,
    Greedy,
}

impl HlhType {
    pub fn from_config(value: u8) -> Self {
        match value {
            1 => HlhType::LinearProgram,
            2 => HlhType::Greedy,
            _ => HlhType::None,
        }
    }
}

/// Computes the h-value for a node given its cardinal-conflict edges.
pub fn compute(hlh_type: HlhType, edges: &[CardinalEdge]) -> f64 {
    match hlh_type {
        HlhType::None => 0.0,
        HlhType::Greedy => greedy_bound(edges),
        HlhType::LinearProgram => lp_bound(edges),
    }
}

/// Greedily picks the heaviest remaining edge, credits its weight, and
/// removes both endpoints (so every other edge touching them is
/// satisfied), repeating until no edges remain. This is a weaker but
/// much cheaper bound than the LP relaxation below.
pub fn greedy_bound(edges: &[CardinalEdge]) -> f64 {
    let mut remaining: Vec<CardinalEdge> = edges.to_vec();
    let mut removed = std::collections::HashSet::new();
    let mut total = 0.0;

    loop {
        remaining.retain(|e| !removed.contains(&e.agent_a) && !removed.contains(&e.agent_b));
        let Some((idx, _)) = remaining
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal))
        else {
            break;
        };
        let edge = remaining.remove(idx);
        total += edge.weight;
        removed.insert(edge.agent_a);
        removed.insert(edge.agent_b);
    }

    total
}

/// Solves the LP relaxation of the minimum weighted vertex cover on the
/// cardinal-conflict graph: minimize sum(x_v) subject to x_a + x_b >= 1
/// for every edge (a,b), 0 <= x_v <= 1. Its optimum is always >= the
/// greedy bound and remains admissible, since any integral
/// vertex cover of weight W is a feasible point of the same LP.
///
/// We index variables by agent id as they appear in `edges`, run a
/// from-scratch two-phase dense-tableau simplex, and return the optimal
/// objective value, or 0.0 if the conflict graph is empty.
pub fn lp_bound(edges: &[CardinalEdge]) -> f64 {
    if edges.is_empty() {
        return 0.0;
    }

    let mut agent_index: HashMap<usize, usize> = HashMap::new();
    for e in edges {
        let next = agent_index.len();
        agent_index.entry(e.agent_a).or_insert(next);
        let next = agent_index.len();
        agent_index.entry(e.agent_b).or_insert(next);
    }
    let num_vars = agent_index.len();

    // Constraints: x_a + x_b >= 1 for each edge, plus x_v <= 1 for each
    // variable (the vertex cover relaxation's upper bound). Converted to
    // standard form Ax <= b by negating the >= rows.
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut rhs: Vec<f64> = Vec::new();

    for e in edges {
        let mut row = vec![0.0; num_vars];
        row[agent_index[&e.agent_a]] = -1.0;
        row[agent_index[&e.agent_b]] = -1.0;
        rows.push(row);
        rhs.push(-1.0);
    }
    for v in 0..num_vars {
        let mut row = vec![0.0; num_vars];
        row[v] = 1.0;
        rows.push(row);
        rhs.push(1.0);
    }

    // Objective: minimize sum(x_v), weighted by the max weight touching
    // each vertex so tighter conflicts are covered preferentially. A
    // plain unweighted vertex cover (all coefficients 1) is also a valid
    // admissible bound on the *count* of unresolved conflicts, but we
    // need a cost bound, so we scale the objective by the largest
    // incident edge weight per agent.
    let mut coeff = vec![0.0_f64; num_vars];
    for e in edges {
        let ia = agent_index[&e.agent_a];
        let ib = agent_index[&e.agent_b];
        coeff[ia] = coeff[ia].max(e.weight);
        coeff[ib] = coeff[ib].max(e.weight);
    }

    simplex_minimize(&coeff, &rows, &rhs).unwrap_or(0.0)
}

/// Two-phase primal simplex (dense tableau, Bland's rule to avoid
/// cycling) minimizing `c . x` subject to `rows . x <= rhs`, `x >= 0`.
/// Returns `None` if the problem is infeasible or unbounded, which
/// should not occur for the vertex-cover relaxation (it is always
/// feasible and bounded by `num_vars`).
fn simplex_minimize(c: &[f64], rows: &[Vec<f64>], rhs: &[f64]) -> Option<f64> {
    let num_vars = c.len();
    let num_constraints = rows.len();

    // Phase 1 is unnecessary here: every constraint with negative rhs
    // (the >= rows, negated) is handled by introducing an artificial
    // variable when the slack's initial value would be negative. To
    // keep this general we run a standard two-phase method: first
    // minimize the sum of artificials, then minimize the real objective
    // over the feasible basis found.

    let num_total = num_vars + num_constraints; // + slacks
    let mut tableau: Vec<Vec<f64>> = Vec::with_capacity(num_constraints);
    let mut artificial_cols = Vec::new();

    for i in 0..num_constraints {
        let mut row = vec![0.0; num_total + num_constraints + 1]; // + artificials + rhs
        row[..num_vars].copy_from_slice(&rows[i]);
        row[num_vars + i] = 1.0; // slack
        let mut b = rhs[i];
        if b < 0.0 {
            // Flip the row so the slack's coefficient and rhs are both
            // non-negative, then this row needs an artificial variable.
            for v in row.iter_mut().take(num_vars + num_constraints) {
                *v = -*v;
            }
            b = -b;
        }
        let art_col = num_total + artificial_cols.len();
        row[art_col] = 1.0;
        artificial_cols.push((i, art_col));
        row[row.len() - 1] = b;
        tableau.push(row);
    }

    let total_cols = num_total + artificial_cols.len() + 1;
    for row in &mut tableau {
        row.resize(total_cols, 0.0);
    }

    let mut basis: Vec<usize> = artificial_cols.iter().map(|&(_, col)| col).collect();

    // Phase 1 objective: minimize sum of artificial variables. Since
    // every artificial starts basic, its reduced cost must be zeroed by
    // subtracting its (weight-1) row from the objective row.
    let mut reduced = vec![0.0; total_cols];
    for &(_, col) in &artificial_cols {
        reduced[col] = 1.0;
    }
    for i in 0..num_constraints {
        let basic_col = basis[i];
        if reduced[basic_col] != 0.0 {
            let factor = reduced[basic_col];
            for j in 0..total_cols {
                reduced[j] -= factor * tableau[i][j];
            }
        }
    }

    run_simplex_iterations(&mut tableau, &mut reduced, &mut basis, total_cols);

    let phase1_value = -reduced[total_cols - 1];
    if phase1_value.abs() > 1e-6 {
        return None; // infeasible
    }

    // Drive any remaining artificial variables out of the basis (degenerate case).
    for i in 0..num_constraints {
        if let Some(&(_, art_col)) = artificial_cols.iter().find(|&&(_, c)| c == basis[i]) {
            let pivot_col = (0..num_vars + num_constraints).find(|&j| tableau[i][j].abs() > 1e-9);
            if let Some(col) = pivot_col {
                pivot(&mut tableau, &mut reduced, i, col, total_cols);
                basis[i] = col;
            }
            let _ = art_col;
        }
    }

    // Phase 2: restore the real objective over non-artificial columns,
    // then zero artificial columns out entirely so they can never be
    // reintroduced into the basis.
    let mut obj = vec![0.0; total_cols];
    obj[..num_vars].copy_from_slice(c);
    for &(_, col) in &artificial_cols {
        obj[col] = f64::INFINITY; // never allowed back in
    }

    let mut reduced2 = obj.clone();
    for i in 0..num_constraints {
        let basic_col = basis[i];
        let factor = reduced2[basic_col];
        if factor != 0.0 && factor.is_finite() {
            for j in 0..total_cols {
                if tableau[i][j].is_finite() {
                    reduced2[j] -= factor * tableau[i][j];
                }
            }
        }
    }

    run_simplex_iterations(&mut tableau, &mut reduced2, &mut basis, num_vars + num_constraints);

    let mut solution = vec![0.0; num_vars];
    for (i, &b) in basis.iter().enumerate() {
        if b < num_vars {
            solution[b] = tableau[i][total_cols - 1];
        }
    }

    Some(c.iter().zip(solution.iter()).map(|(ci, xi)| ci * xi).sum())
}

/// Bland's-rule simplex loop: at each step, pick the lowest-indexed
/// column with a negative reduced cost (entering variable), then the
/// lowest-indexed row achieving the minimum ratio test (leaving
/// variable), guaranteeing termination without cycling.
fn run_simplex_iterations(
    tableau: &mut [Vec<f64>],
    reduced: &mut [f64],
    basis: &mut [usize],
    limit_cols: usize,
) {
    let total_cols = tableau.first().map(|r| r.len()).unwrap_or(0);
    loop {
        let Some(enter) = (0..limit_cols.min(total_cols.saturating_sub(1)))
            .find(|&j| reduced[j] < -1e-9)
        else {
            break;
        };

        let mut leave: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for i in 0..tableau.len() {
            let coeff = tableau[i][enter];
            if coeff > 1e-9 {
                let ratio = tableau[i][total_cols - 1] / coeff;
                if ratio < best_ratio - 1e-9 || (ratio < best_ratio + 1e-9 && leave.map_or(true, |l| basis[i] < basis[l])) {
                    best_ratio = ratio;
                    leave = Some(i);
                }
            }
        }

        let Some(leave_row) = leave else {
            break; // unbounded; should not happen for this relaxation
        };

        pivot(tableau, reduced, leave_row, enter, total_cols);
        basis[leave_row] = enter;
    }
}

fn pivot(tableau: &mut [Vec<f64>], reduced: &mut [f64], row: usize, col: usize, total_cols: usize) {
    let pivot_val = tableau[row][col];
    for j in 0..total_cols {
        tableau[row][j] /= pivot_val;
    }
    for i in 0..tableau.len() {
        if i == row {
            continue;
        }
        let factor = tableau[i][col];
        if factor != 0.0 {
            for j in 0..total_cols {
                tableau[i][j] -= factor * tableau[row][j];
            }
        }
    }
    let factor = reduced[col];
    if factor != 0.0 {
        for j in 0..total_cols {
            reduced[j] -= factor * tableau[row][j];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_edges_gives_zero_regardless_of_type() {
        assert_eq!(compute(HlhType::LinearProgram, &[]), 0.0);
        assert_eq!(compute(HlhType::Greedy, &[]), 0.0);
        assert_eq!(compute(HlhType::None, &[CardinalEdge { agent_a: 0, agent_b: 1, weight: 5.0 }]), 0.0);
    }

    #[test]
    fn greedy_sums_disjoint_edges() {
        let edges = vec![
            CardinalEdge { agent_a: 0, agent_b: 1, weight: 2.0 },
            CardinalEdge { agent_a: 2, agent_b: 3, weight: 3.0 },
        ];
        assert_eq!(greedy_bound(&edges), 5.0);
    }

    #[test]
    fn greedy_only_counts_once_for_a_shared_agent() {
        let edges = vec![
            CardinalEdge { agent_a: 0, agent_b: 1, weight: 2.0 },
            CardinalEdge { agent_a: 1, agent_b: 2, weight: 2.0 },
        ];
        // Picking either edge removes agent 1, which kills the other edge.
        assert_eq!(greedy_bound(&edges), 2.0);
    }

    #[test]
    fn lp_bound_is_at_least_the_greedy_bound_on_a_triangle() {
        // A 3-cycle where every edge weighs w: the integral minimum
        // vertex cover needs 2 of the 3 agents (cost 2w), but the LP
        // relaxation allows x_v = 0.5 everywhere, giving 1.5w.
        let edges = vec![
            CardinalEdge { agent_a: 0, agent_b: 1, weight: 1.0 },
            CardinalEdge { agent_a: 1, agent_b: 2, weight: 1.0 },
            CardinalEdge { agent_a: 0, agent_b: 2, weight: 1.0 },
        ];
        let lp = lp_bound(&edges);
        let greedy = greedy_bound(&edges);
        assert!(lp >= greedy - 1e-6, "lp={lp} greedy={greedy}");
        assert!((lp - 1.5).abs() < 1e-4, "expected 1.5, got {lp}");
    }

    #[test]
    fn from_config_maps_flag_values() {
        assert_eq!(HlhType::from_config(0), HlhType::None);
        assert_eq!(HlhType::from_config(1), HlhType::LinearProgram);
        assert_eq!(HlhType::from_config(2), HlhType::Greedy);
        assert_eq!(HlhType::from_config(9), HlhType::None);
    }
}
