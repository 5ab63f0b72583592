use rand::Rng;

use super::SimulationError;
use crate::dag::{DagTask, NodeId};
use crate::priority::PriorityMap;
use crate::time::{divide_with_ceil, Service};

/// How an idle core picks among the ready nodes.
#[derive(Debug, Clone, Copy)]
pub enum DispatchPolicy<'a> {
    /// A uniformly random ready node.
    Random,
    /// The ready node with the highest level; the smallest id among
    /// equals.
    StaticPriority(&'a PriorityMap),
    /// The ready node with the largest worst-case cost; the smallest id
    /// among equals.
    DynamicGreedy,
}

impl DispatchPolicy<'_> {
    /// Pick a position in `ready`, which must be non-empty and sorted
    /// by node id.
    pub(super) fn select<R: Rng>(
        &self,
        dag: &DagTask,
        ready: &[NodeId],
        rng: &mut R,
    ) -> Result<usize, SimulationError> {
        match self {
            DispatchPolicy::Random => Ok(rng.gen_range(0..ready.len())),
            DispatchPolicy::StaticPriority(prios) => {
                let level = |node: NodeId| {
                    prios
                        .get(node)
                        .ok_or(SimulationError::MissingPriority { node })
                };
                let mut best = (0, level(ready[0])?);
                for (i, node) in ready.iter().enumerate().skip(1) {
                    let l = level(*node)?;
                    if l > best.1 {
                        best = (i, l);
                    }
                }
                Ok(best.0)
            }
            DispatchPolicy::DynamicGreedy => {
                let mut best = 0;
                for (i, node) in ready.iter().enumerate().skip(1) {
                    if dag.cost(*node) > dag.cost(ready[best]) {
                        best = i;
                    }
                }
                Ok(best)
            }
        }
    }
}

/// How long a dispatched node actually runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionModel {
    /// Exactly the worst-case cost.
    #[default]
    Exact,
    /// Uniformly drawn from `ceil(C / 2)..=C`.
    UniformHalf,
    /// Uniformly drawn from `1..=C`.
    UniformFull,
}

impl ExecutionModel {
    /// Draw an actual execution time for a node of cost `wcet`.
    /// Zero-cost nodes always take zero time.
    pub fn realize<R: Rng>(&self, wcet: Service, rng: &mut R) -> Service {
        match self {
            ExecutionModel::Exact => wcet,
            _ if wcet == 0 => 0,
            ExecutionModel::UniformHalf => rng.gen_range(divide_with_ceil(wcet, 2)..=wcet),
            ExecutionModel::UniformFull => rng.gen_range(1..=wcet),
        }
    }
}
