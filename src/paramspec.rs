//! Parameter domain model: `ParameterSpec`, `ParamValue`, `ParameterSet`
//! (spec.md §3).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A concrete primitive value a parameter can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Real(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    /// Stable, round-trippable string form: integers without a trailing
    /// `.0`, reals with enough digits to round-trip, strings verbatim and
    /// unquoted (spec.md §6).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Real(r) => write!(f, "{r}"),
            ParamValue::Str(s) => write!(f, "{s}"),
        }
    }
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Real(r) => Some(*r),
            ParamValue::Str(_) => None,
        }
    }
}

/// A named dimension of the search space (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterSpec {
    Range { min: f64, max: f64 },
    LogRange { min: f64, max: f64 },
    Values { choices: Vec<ParamValue> },
}

impl ParameterSpec {
    /// Validate the invariants from spec.md §3. Unknown `type` tags are
    /// already rejected by serde at deserialization time; this validates
    /// the remaining per-kind invariants that serde cannot express.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        match self {
            ParameterSpec::Range { min, max } => {
                if min > max {
                    return Err(ConfigError::InvalidParameterSpec {
                        name: name.to_string(),
                        reason: format!("min ({min}) must be <= max ({max})"),
                    });
                }
            }
            ParameterSpec::LogRange { min, max } => {
                if *min <= 0.0 {
                    return Err(ConfigError::InvalidParameterSpec {
                        name: name.to_string(),
                        reason: format!("min ({min}) must be > 0 for log_range"),
                    });
                }
                if min > max {
                    return Err(ConfigError::InvalidParameterSpec {
                        name: name.to_string(),
                        reason: format!("min ({min}) must be <= max ({max})"),
                    });
                }
            }
            ParameterSpec::Values { choices } => {
                if choices.is_empty() {
                    return Err(ConfigError::InvalidParameterSpec {
                        name: name.to_string(),
                        reason: "choices must be non-empty".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A concrete assignment of values to every tunable parameter for one trial.
///
/// Backed by a `Vec` rather than a map: insertion order is irrelevant for
/// semantics but is preserved so that `render()` is reproducible, per
/// spec.md §3.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render to the command-line argument string from spec.md §6:
    /// `name=value` tokens joined by single spaces, in enumeration order.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse a rendered params_string back into name/value pairs. Values
    /// are kept as strings (the engine only needs the name, not the typed
    /// value, once a job has completed) — mirrors the Python
    /// `dict([arg_val.split('=') for arg_val in s.split()])` used by the
    /// original to reconstruct `params` for `gen_new_params`.
    pub fn parse(rendered: &str) -> Self {
        let mut set = Self::new();
        for token in rendered.split_whitespace() {
            if let Some((name, value)) = token.split_once('=') {
                set.insert(name.to_string(), ParamValue::Str(value.to_string()));
            }
        }
        set
    }
}

impl FromIterator<(String, ParamValue)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
