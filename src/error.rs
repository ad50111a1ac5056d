use std::fmt;

/// Reason a high-level search terminated without a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSolutionReason {
    Timeout,
    StepLimit,
    Infeasible,
}

impl fmt::Display for NoSolutionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoSolutionReason::Timeout => write!(f, "timeout"),
            NoSolutionReason::StepLimit => write!(f, "step_limit"),
            NoSolutionReason::Infeasible => write!(f, "infeasible"),
        }
    }
}

/// Errors surfaced to the caller. `NoSolutionFound` is a normal, expected
/// outcome (see [`crate::solution::Solution::not_found`]) and is kept
/// separate from this enum; callers that want it as an error can wrap it.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The input was malformed before any search began: an out-of-range
    /// agent radius, a start vertex missing from the roadmap, or two
    /// agents sharing a start/goal vertex.
    InvalidInput(String),
    /// An internal invariant was violated. This should never happen on
    /// well-formed input; it indicates a bug.
    InternalAssertionFailed(String),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            SolverError::InternalAssertionFailed(msg) => {
                write!(f, "internal assertion failed: {msg}")
            }
        }
    }
}

impl std::error::Error for SolverError {}

pub type SolverResult<T> = Result<T, SolverError>;
