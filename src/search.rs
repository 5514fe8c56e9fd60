//! Search algorithm interface: a pluggable producer of parameter
//! dictionaries that consumes result feedback (spec.md §4.2).

use async_trait::async_trait;

use crate::paramspec::ParameterSet;

/// One item of `gen_new_params`'s return value: either a new point to
/// evaluate, or the sentinel that tells the `ExecutionManager` the search is
/// over.
#[derive(Debug, Clone)]
pub enum GeneratedParams {
    Params(ParameterSet),
    Sentinel,
}

/// A pluggable module that proposes [`ParameterSet`]s and consumes scalar
/// feedback to steer future proposals.
///
/// `Send + Sync` so the `ExecutionManager`'s Generator task can own it
/// behind a single handle for the life of the run; the trait is async so
/// model-based algorithms may perform I/O (e.g. fitting a surrogate model)
/// inside either method.
#[async_trait]
pub trait SearchAlgorithm: Send + Sync {
    /// The seed batch. May be empty, or include user-pinned configurations
    /// concatenated ahead of algorithm-chosen ones.
    async fn gen_initial_params(&mut self) -> Vec<ParameterSet>;

    /// Invoked once per completed job, in completion order. May return an
    /// empty list, one or more new `ParameterSet`s, or
    /// `GeneratedParams::Sentinel` to indicate the search is over.
    async fn gen_new_params(
        &mut self,
        result: f64,
        params: &ParameterSet,
        evaluation_succeeded: bool,
    ) -> Vec<GeneratedParams>;
}
