/*! Response-time analysis of DAG tasks

Three bounds on the worst-case response time of a DAG task running
non-preemptively on `m` identical cores are provided:

- [classic_bound], the Graham-style bound `L + ceil((W - L) / m)` that
  holds for any work-conserving schedule,
- [work_conserving_bound], which also holds for any work-conserving
  schedule and bounds, node by node, how long a ready node can be kept
  from a core, and
- [alpha_beta_bound], which walks the provider/consumer decomposition
  and credits consumer work that overlaps its provider (`alpha`) while
  charging consumer work that delays the next provider (`beta`). With a
  [PriorityMap][crate::priority::PriorityMap], interference is limited
  to what the priority order admits.

The classic bound and the alpha/beta bound are independent; neither is
guaranteed to dominate the other. An alpha/beta bound is only returned
if it is not below [work_conserving_bound], so every bound returned
holds for every dispatch policy of the
[simulator][crate::simulation].
*/

use thiserror::Error;

use crate::dag::{DagTask, NodeId};
use crate::time::{divide_with_ceil, Duration, Service};

mod alpha_beta;
mod work_conserving;

pub use alpha_beta::{alpha_beta_bound, Case, ProviderBound, ResponseTimeBound};
pub use work_conserving::work_conserving_bound;

/// Errors raised by the analyses. Apart from [AnalysisError::NoCores],
/// they indicate an inconsistency that makes any result untrustworthy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("at least one core is required")]
    NoCores,

    #[error("finish time of {node} used before it was computed")]
    MissingFinishTime { node: NodeId },

    #[error("interference set of {node} used before it was computed")]
    MissingInterferenceSet { node: NodeId },

    #[error("{node} has no priority level")]
    MissingPriority { node: NodeId },

    /// The overlap credit of a provider exceeds what `m - 1` cores can
    /// execute while the provider runs.
    #[error("credit {alpha} of provider {provider} exceeds its ceiling {ceiling}")]
    CreditCeilingExceeded {
        provider: usize,
        alpha: Service,
        ceiling: Service,
    },

    #[error("credit {alpha} plus delay {beta} of provider {provider} exceed its consumer's work {work}")]
    CreditExceedsWorkload {
        provider: usize,
        alpha: Service,
        beta: Service,
        work: Service,
    },

    /// Some work-conserving schedule may take longer than the bound.
    #[error("bound {bound} is below the work-conserving bound {safe}")]
    UnsafeBound { bound: Duration, safe: Duration },
}

pub type AnalysisResult = Result<ResponseTimeBound, AnalysisError>;

/// The classic bound `R = L + ceil((W - L) / m)` on `cores` cores.
#[allow(non_snake_case)]
pub fn classic_bound(dag: &DagTask, cores: usize) -> Result<Duration, AnalysisError> {
    if cores == 0 {
        return Err(AnalysisError::NoCores);
    }
    let L = dag.critical_path().length();
    let W = dag.volume();
    Ok(L + divide_with_ceil(W - L, cores as Service))
}

#[cfg(test)]
mod tests;
