//! The tuning objective and its associated failure score (spec.md §3).

use serde::{Deserialize, Serialize};

/// Whether the search minimizes or maximizes the parsed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Minimize,
    Maximize,
}

impl Objective {
    /// The sentinel value assigned to any job that does not yield a valid,
    /// constraint-satisfying result: +inf when minimizing, -inf when
    /// maximizing, so failed jobs always sort last.
    pub fn failure_score(self) -> f64 {
        match self {
            Objective::Minimize => f64::INFINITY,
            Objective::Maximize => f64::NEG_INFINITY,
        }
    }

    /// `true` if `a` should be ordered ahead of `b` under this objective.
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            Objective::Minimize => a < b,
            Objective::Maximize => a > b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimize_failure_score_is_positive_infinity() {
        assert_eq!(Objective::Minimize.failure_score(), f64::INFINITY);
    }

    #[test]
    fn maximize_failure_score_is_negative_infinity() {
        assert_eq!(Objective::Maximize.failure_score(), f64::NEG_INFINITY);
    }

    #[test]
    fn is_better_respects_objective() {
        assert!(Objective::Minimize.is_better(1.0, 2.0));
        assert!(!Objective::Minimize.is_better(2.0, 1.0));
        assert!(Objective::Maximize.is_better(2.0, 1.0));
        assert!(!Objective::Maximize.is_better(1.0, 2.0));
    }
}
