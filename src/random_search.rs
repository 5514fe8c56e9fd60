//! Reference search algorithm: independent uniform (or log-uniform)
//! sampling over the parameter space (spec.md §4.2 example; grounded on the
//! legacy `RandomSearch`).
//!
//! Every evaluation is independent of every other, so the entire batch is
//! produced up front in `gen_initial_params`; `gen_new_params` always
//! signals the search is over.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::ConfigError;
use crate::paramspec::{ParamValue, ParameterSet, ParameterSpec};
use crate::search::{GeneratedParams, SearchAlgorithm};

/// Samples `num_evals` independent points from `params_to_tune`, optionally
/// preceded by a fixed batch of user-pinned configurations
/// (`params_to_try_first`). Owns its own seeded generator — no process-
/// global RNG is touched anywhere in this crate.
pub struct RandomSearch {
    params_to_tune: Vec<(String, ParameterSpec)>,
    params_to_try_first: Vec<ParameterSet>,
    num_evals: usize,
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(
        params_to_tune: Vec<(String, ParameterSpec)>,
        params_to_try_first: Vec<ParameterSet>,
        num_evals: usize,
        random_seed: u64,
    ) -> Result<Self, ConfigError> {
        for (name, spec) in &params_to_tune {
            spec.validate(name)?;
        }
        Ok(Self {
            params_to_tune,
            params_to_try_first,
            num_evals,
            rng: StdRng::seed_from_u64(random_seed),
        })
    }

    fn sample_params(&mut self) -> ParameterSet {
        let mut set = ParameterSet::new();
        for (name, spec) in &self.params_to_tune {
            let value = match spec {
                ParameterSpec::Range { min, max } => {
                    if min >= max {
                        ParamValue::Real(*min)
                    } else {
                        ParamValue::Real(self.rng.gen_range(*min..*max))
                    }
                }
                ParameterSpec::LogRange { min, max } => {
                    if min >= max {
                        ParamValue::Real(*min)
                    } else {
                        let sampled = self.rng.gen_range(min.ln()..max.ln());
                        ParamValue::Real(sampled.exp())
                    }
                }
                ParameterSpec::Values { choices } => choices
                    .choose(&mut self.rng)
                    .cloned()
                    .expect("validate() rejects empty choices"),
            };
            set.insert(name.clone(), value);
        }
        set
    }
}

#[async_trait]
impl SearchAlgorithm for RandomSearch {
    async fn gen_initial_params(&mut self) -> Vec<ParameterSet> {
        let mut batch = std::mem::take(&mut self.params_to_try_first);
        for _ in 0..self.num_evals {
            batch.push(self.sample_params());
        }
        batch
    }

    async fn gen_new_params(
        &mut self,
        _result: f64,
        _params: &ParameterSet,
        _evaluation_succeeded: bool,
    ) -> Vec<GeneratedParams> {
        vec![GeneratedParams::Sentinel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_batch_prepends_pinned_configs_then_samples() {
        let mut pinned = ParameterSet::new();
        pinned.insert("x", ParamValue::Real(0.5));
        let mut rs = RandomSearch::new(
            vec![("x".to_string(), ParameterSpec::Range { min: 0.0, max: 1.0 })],
            vec![pinned.clone()],
            4,
            42,
        )
        .unwrap();
        let batch = rs.gen_initial_params().await;
        assert_eq!(batch.len(), 5);
        assert_eq!(batch[0], pinned);
    }

    #[tokio::test]
    async fn range_samples_stay_within_bounds() {
        let mut rs = RandomSearch::new(
            vec![("x".to_string(), ParameterSpec::Range { min: -2.0, max: 3.0 })],
            vec![],
            200,
            7,
        )
        .unwrap();
        for params in rs.gen_initial_params().await {
            let x = params.get("x").unwrap().as_f64().unwrap();
            assert!((-2.0..3.0).contains(&x), "{x} out of range");
        }
    }

    #[tokio::test]
    async fn log_range_samples_stay_positive_and_within_bounds() {
        let mut rs = RandomSearch::new(
            vec![("lr".to_string(), ParameterSpec::LogRange { min: 1e-5, max: 1e-1 })],
            vec![],
            200,
            11,
        )
        .unwrap();
        for params in rs.gen_initial_params().await {
            let lr = params.get("lr").unwrap().as_f64().unwrap();
            assert!((1e-5..=1e-1).contains(&lr), "{lr} out of log_range bounds");
        }
    }

    #[tokio::test]
    async fn values_samples_are_drawn_from_choices() {
        let choices = vec![
            ParamValue::Str("red".to_string()),
            ParamValue::Str("green".to_string()),
        ];
        let mut rs = RandomSearch::new(
            vec![("color".to_string(), ParameterSpec::Values { choices: choices.clone() })],
            vec![],
            50,
            3,
        )
        .unwrap();
        for params in rs.gen_initial_params().await {
            let value = params.get("color").unwrap().clone();
            assert!(choices.contains(&value));
        }
    }

    #[tokio::test]
    async fn gen_new_params_always_signals_done() {
        let mut rs = RandomSearch::new(vec![], vec![], 1, 0).unwrap();
        let empty = ParameterSet::new();
        let result = rs.gen_new_params(1.0, &empty, true).await;
        assert!(matches!(result.as_slice(), [GeneratedParams::Sentinel]));
    }

    #[test]
    fn rejects_invalid_parameter_spec() {
        let err = RandomSearch::new(
            vec![("x".to_string(), ParameterSpec::Range { min: 5.0, max: 1.0 })],
            vec![],
            1,
            0,
        );
        assert!(err.is_err());
    }
}
