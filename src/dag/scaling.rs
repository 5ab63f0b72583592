use itertools::Itertools;
use petgraph::graph::NodeIndex;
use tracing::debug;

use super::{CriticalPath, DagTask, ModelError, NodeId};
use crate::time::Service;

impl DagTask {
    /// Rescale the node costs so that the critical path accounts for
    /// the fraction `ratio` of the total work, keeping the total work
    /// unchanged.
    ///
    /// The critical path (except the sink) receives `round(ratio * W)`
    /// minus the sink's cost; the remaining work is spread over the
    /// non-critical nodes. Within each group, the new costs are
    /// proportional to the old ones (largest-remainder rounding).
    ///
    /// Fails with [ModelError::CriticalPathShifted] if the rescaled
    /// task has a different critical path, and with
    /// [ModelError::InvalidCriticalRatio] if `ratio` is not in `(0, 1]`
    /// or cannot be met with the task's structure.
    pub fn scale_to_critical_ratio(&self, ratio: f64) -> Result<DagTask, ModelError> {
        let invalid = ModelError::InvalidCriticalRatio { ratio };
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(invalid);
        }

        let total = self.volume();
        let sink = self.sink();
        let target_length = ((ratio * total as f64).round() as Service).min(total);
        let (on_path, off_path): (Vec<NodeId>, Vec<NodeId>) = self
            .nodes()
            .filter(|v| *v != sink)
            .partition(|v| self.critical_path.contains(*v));

        let on_target = match target_length.checked_sub(self.cost(sink)) {
            Some(t) => t,
            None => return Err(invalid),
        };
        let off_target = total - target_length;
        if (on_path.is_empty() && on_target > 0) || (off_path.is_empty() && off_target > 0) {
            return Err(invalid);
        }

        let mut scaled = self.clone();
        for (group, target) in [(&on_path, on_target), (&off_path, off_target)] {
            let weights: Vec<Service> = group.iter().map(|v| self.cost(*v)).collect();
            for (v, c) in group.iter().zip(apportion(&weights, target)) {
                scaled.graph[NodeIndex::from(*v)] = c;
            }
        }

        scaled.critical_path = CriticalPath::of(&scaled)?;
        if scaled.critical_path.nodes() != self.critical_path.nodes() {
            return Err(ModelError::CriticalPathShifted {
                before: self.critical_path.nodes().to_vec(),
                after: scaled.critical_path.nodes().to_vec(),
            });
        }

        debug!(
            ratio,
            length = scaled.critical_path.length(),
            volume = scaled.volume(),
            "rescaled task costs"
        );
        Ok(scaled)
    }
}

/// Split `total` into integral shares proportional to `weights`.
///
/// The shares always sum to `total`. Units left over after rounding
/// down go to the largest remainders, ties to the earlier position.
/// All-zero weights split `total` evenly.
fn apportion(weights: &[Service], total: Service) -> Vec<Service> {
    if weights.is_empty() {
        return Vec::new();
    }
    let count = weights.len() as Service;
    let sum: u128 = weights.iter().map(|w| *w as u128).sum();
    if sum == 0 {
        let (base, extra) = (total / count, (total % count) as usize);
        return (0..weights.len())
            .map(|i| base + (i < extra) as Service)
            .collect();
    }

    let products: Vec<u128> = weights.iter().map(|w| *w as u128 * total as u128).collect();
    let mut shares: Vec<Service> = products.iter().map(|p| (p / sum) as Service).collect();
    let missing = (total - shares.iter().sum::<Service>()) as usize;
    let by_remainder = (0..weights.len())
        .sorted_by(|a, b| (products[*b] % sum).cmp(&(products[*a] % sum)).then(a.cmp(b)));
    for i in by_remainder.take(missing) {
        shares[i] += 1;
    }
    shares
}
