//! Configuration loading: JSON tuning-run description → `TuningConfig`, and
//! the tag-to-constructor registry for pluggable backends/search algorithms
//! (spec.md §9 Design Notes: "a registry mapping tag to constructor").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::actor::ActorConfig;
use crate::backend::Backend;
use crate::constraint::ConstraintSpec;
use crate::error::ConfigError;
use crate::objective::Objective;
use crate::paramspec::{ParamValue, ParameterSet, ParameterSpec};
use crate::search::SearchAlgorithm;

/// A plug-in reference: a registry tag plus its own free-form options,
/// resolved by [`registry::build_backend`] / [`registry::build_search_algorithm`].
#[derive(Debug, Clone, Deserialize)]
pub struct PluginSpec {
    pub tag: String,
    #[serde(default)]
    pub options: Value,
}

/// The full description of one tuning run, loaded once at startup.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TuningConfig {
    pub result_pattern: String,
    pub objective: Objective,
    pub params_to_tune: BTreeMap<String, ParameterSpec>,
    #[serde(default)]
    pub params_to_try_first: Option<Vec<BTreeMap<String, ParamValue>>>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    pub backend: PluginSpec,
    pub search_algorithm: PluginSpec,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    pub num_evals: u32,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub poll_interval_secs: Option<f64>,
    #[serde(default)]
    pub log_settle_delay_secs: Option<f64>,
}

impl TuningConfig {
    /// Read and parse `path`, rejecting unknown fields and invalid
    /// parameter/constraint specs before returning.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: TuningConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, spec) in &self.params_to_tune {
            spec.validate(name)?;
        }
        for constraint in &self.constraints {
            if constraint.range.0 > constraint.range.1 {
                return Err(ConfigError::InvalidConstraintSpec(format!(
                    "constraint on \"{}\": range min must be <= max",
                    constraint.pattern
                )));
            }
        }
        Ok(())
    }

    /// `params_to_tune` as an order-stable list (`BTreeMap`'s key order),
    /// the shape `RandomSearch` and any future algorithm plug-in consume.
    pub fn params_to_tune_vec(&self) -> Vec<(String, ParameterSpec)> {
        self.params_to_tune
            .iter()
            .map(|(name, spec)| (name.clone(), spec.clone()))
            .collect()
    }

    /// `params_to_try_first` as fully-formed `ParameterSet`s, in the order
    /// the config listed them.
    pub fn params_to_try_first_sets(&self) -> Vec<ParameterSet> {
        self.params_to_try_first
            .iter()
            .flatten()
            .map(|entry| entry.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .collect()
    }

    pub fn actor_config(&self) -> ActorConfig {
        let default = ActorConfig::default();
        ActorConfig {
            poll_interval: self
                .poll_interval_secs
                .map(Duration::from_secs_f64)
                .unwrap_or(default.poll_interval),
            log_settle_delay: self
                .log_settle_delay_secs
                .map(Duration::from_secs_f64)
                .unwrap_or(default.log_settle_delay),
            max_retries: self.max_retries.unwrap_or(default.max_retries),
        }
    }
}

pub mod registry {
    use super::*;
    use crate::backends::local::LocalProcessBackend;
    use crate::random_search::RandomSearch;

    #[derive(Deserialize)]
    struct LocalProcessOptions {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        num_workers: usize,
    }

    /// Resolve a backend `PluginSpec` to a constructed, boxed `Backend`.
    pub fn build_backend(spec: &PluginSpec) -> Result<Arc<dyn Backend>, ConfigError> {
        match spec.tag.as_str() {
            "local_process" => {
                let opts: LocalProcessOptions = serde_json::from_value(spec.options.clone())?;
                Ok(Arc::new(LocalProcessBackend::new(opts.program, opts.args, opts.num_workers)))
            }
            other => Err(ConfigError::UnknownPlugin(other.to_string())),
        }
    }

    #[derive(Deserialize, Default)]
    struct RandomSearchOptions {
        #[serde(default)]
        random_seed: u64,
    }

    /// Resolve a search-algorithm `PluginSpec` to a constructed, boxed
    /// `SearchAlgorithm`. The parameter space and evaluation budget come
    /// from the top-level config rather than the plug-in's own options,
    /// since every search algorithm needs them.
    pub fn build_search_algorithm(
        spec: &PluginSpec,
        params_to_tune: Vec<(String, ParameterSpec)>,
        params_to_try_first: Vec<ParameterSet>,
        num_evals: usize,
    ) -> Result<Box<dyn SearchAlgorithm>, ConfigError> {
        match spec.tag.as_str() {
            "random_search" => {
                let opts: RandomSearchOptions = if spec.options.is_null() {
                    RandomSearchOptions::default()
                } else {
                    serde_json::from_value(spec.options.clone())?
                };
                let search = RandomSearch::new(params_to_tune, params_to_try_first, num_evals, opts.random_seed)?;
                Ok(Box::new(search))
            }
            other => Err(ConfigError::UnknownPlugin(other.to_string())),
        }
    }
}
