//! Shared numeric policy: one epsilon for every strict/non-strict
//! comparison in the solver.

/// Absolute tolerance used for all time/distance comparisons.
pub const EPS: f64 = 1e-9;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}

pub fn approx_lt(a: f64, b: f64) -> bool {
    a < b - EPS
}

pub fn approx_le(a: f64, b: f64) -> bool {
    a <= b + EPS
}

pub fn approx_gt(a: f64, b: f64) -> bool {
    a > b + EPS
}

pub fn approx_ge(a: f64, b: f64) -> bool {
    a >= b - EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerates_epsilon_noise() {
        assert!(approx_eq(1.0, 1.0 + EPS / 2.0));
        assert!(!approx_eq(1.0, 1.1));
        assert!(approx_lt(1.0, 1.0 + 10.0 * EPS));
        assert!(!approx_lt(1.0, 1.0 + EPS / 2.0));
    }
}
