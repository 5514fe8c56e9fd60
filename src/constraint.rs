//! Constraint evaluator: the early-kill oracle (spec.md §4.4).
//!
//! For each `ConstraintSpec`, every match of `pattern` in the log after the
//! first `skip_first` is followed by a whitespace-delimited token, passed
//! through `formatter` to a real, and checked against `[lo, hi]`. Any
//! parse/format failure makes the whole evaluation fail closed
//! ("unsatisfied"), matching the bare `except: return False` in the
//! original.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single runtime constraint extracted from a job's log.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub pattern: String,
    pub range: (f64, f64),
    #[serde(default)]
    pub skip_first: usize,
    /// Custom token formatter; `None` uses the default `str::parse::<f64>`.
    /// Not representable in JSON configuration — library consumers can
    /// attach one programmatically via [`ConstraintSpec::with_formatter`].
    #[serde(skip)]
    pub formatter: Option<Arc<dyn Fn(&str) -> Option<f64> + Send + Sync>>,
}

impl std::fmt::Debug for ConstraintSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintSpec")
            .field("pattern", &self.pattern)
            .field("range", &self.range)
            .field("skip_first", &self.skip_first)
            .field("formatter", &self.formatter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ConstraintSpec {
    pub fn new(pattern: impl Into<String>, range: (f64, f64), skip_first: usize) -> Self {
        Self {
            pattern: pattern.into(),
            range,
            skip_first,
            formatter: None,
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Fn(&str) -> Option<f64> + Send + Sync>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    fn format_token(&self, token: &str) -> Option<f64> {
        match &self.formatter {
            Some(f) => f(token),
            None => token.parse::<f64>().ok(),
        }
    }
}

/// Returns `true` iff every constraint is satisfied by `log`. Fails closed:
/// any parse error or malformed match makes the log "unsatisfied".
pub fn check_constraints(log: &str, constraints: &[ConstraintSpec]) -> bool {
    for constraint in constraints {
        let mut match_index = 0usize;
        let mut search_from = 0usize;
        loop {
            let Some(rel_pos) = log[search_from..].find(constraint.pattern.as_str()) else {
                break;
            };
            let match_end = search_from + rel_pos + constraint.pattern.len();
            search_from = match_end;

            if match_index < constraint.skip_first {
                match_index += 1;
                continue;
            }
            match_index += 1;

            let Some(token) = log[match_end..].split_whitespace().next() else {
                return false;
            };
            let Some(value) = constraint.format_token(token) else {
                return false;
            };
            let (lo, hi) = constraint.range;
            if value < lo || value > hi {
                return false;
            }
        }
    }
    true
}
