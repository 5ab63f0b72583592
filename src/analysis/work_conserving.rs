use tracing::{debug, trace};

use super::{classic_bound, AnalysisError};
use crate::dag::DagTask;
use crate::graph;
use crate::time::{Duration, Instant, Service};

/// Bound the response time of `dag` on `cores` cores under any
/// work-conserving, non-preemptive dispatcher, whatever order it picks
/// ready nodes in and however much less than its cost a node runs.
///
/// A ready node waits for a core only while all `m` cores are busy, and
/// everything running in the meantime is concurrent to it. At most one
/// of those is a critical node, since the critical path is a chain; a
/// critical node itself competes only with non-critical ones. So for
/// each node `v`, at least `k` non-critical nodes concurrent to `v` run
/// at every instant of its wait, with `k = m` for critical and
/// `k = m - 1` for non-critical `v`. Covering those nodes with chains,
/// no two of which share an instant, the wait is at most the largest
/// `t` with `k * t <= sum(min(work(chain), t))`.
///
/// The finish time bound `F(v) = max F(pred) + C(v) + wait(v)` of the
/// sink is combined with [classic_bound]; the smaller one is returned.
#[allow(non_snake_case)]
pub fn work_conserving_bound(dag: &DagTask, cores: usize) -> Result<Duration, AnalysisError> {
    let classic = classic_bound(dag, cores)?;
    if cores == 1 {
        return Ok(classic);
    }

    let critical = dag.critical_path().members();
    let mut F: Vec<Instant> = Vec::with_capacity(dag.node_count());
    for node in dag.nodes() {
        let release = dag
            .predecessors(node)
            .map(|u| F[u.index()])
            .max()
            .unwrap_or(0);
        let mut rivals = graph::concurrent_nodes(dag, node);
        rivals.difference_with(critical);
        let busy = if critical.contains(node) {
            cores
        } else {
            cores - 1
        };
        let chains: Vec<Service> = graph::chain_cover(dag, &rivals)
            .iter()
            .map(|chain| dag.cost_of(chain.iter().copied()))
            .collect();
        let wait = blocking_time(&chains, busy as Service);
        trace!(node = %node, release, wait, "work-conserving finish time");
        F.push(release + dag.cost(node) + wait);
    }

    let bound = F.last().map_or(classic, |f| classic.min(*f));
    debug!(cores, bound, classic, "work-conserving bound");
    Ok(bound)
}

/// The longest time during which at least `busy` of the given chains can
/// be running at once, if chain `j` runs for at most `chains[j]` in
/// total. `busy` must be positive.
fn blocking_time(chains: &[Service], busy: Service) -> Duration {
    let fits = |t: Duration| busy * t <= chains.iter().map(|w| (*w).min(t)).sum::<Service>();
    // `fits` holds on a prefix of the candidates: the slack
    // `sum(min(w, t)) - busy * t` is concave and zero at `t = 0`
    let mut low = 0;
    let mut high = chains.iter().sum::<Service>() / busy;
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if fits(mid) {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    low
}
