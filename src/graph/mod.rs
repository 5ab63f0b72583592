/*! Structural queries on DAG tasks

All functions here are pure: they take the canonical [DagTask] and,
where a sub-DAG is meant, a [NodeSet] mask selecting the nodes that are
still "active". Returned node collections are in ascending order unless
documented otherwise.
*/

use std::collections::hash_map::RandomState;

use fixedbitset::FixedBitSet;
use itertools::Itertools;
use petgraph::algo::all_simple_paths;
use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, GraphBase, IntoNeighbors, Reversed, Visitable};

use crate::dag::{DagTask, NodeId};
use crate::time::Service;

mod node_set;
mod parallelism;

pub use node_set::{Iter, NodeSet};
pub use parallelism::{antichain_width, chain_cover, test_parallelism};

/// All paths from `from` to `to`, optionally restricted to the nodes in
/// `scope`, in depth-first order along the task's edge order.
pub fn paths(
    dag: &DagTask,
    from: NodeId,
    to: NodeId,
    scope: Option<&NodeSet>,
) -> Vec<Vec<NodeId>> {
    let in_scope = |v: NodeId| scope.map_or(true, |s| s.contains(v));
    if !in_scope(from) || !in_scope(to) {
        return Vec::new();
    }
    if from == to {
        return vec![vec![from]];
    }

    // the induced sub-graph keeps the node and edge order of the task
    let sub = dag.graph().filter_map(
        |i, _| Some(NodeId::from(i)).filter(|v| in_scope(*v)),
        |_, _| Some(()),
    );
    let position = |v: NodeId| sub.node_indices().find(|i| sub[*i] == v);
    let (start, end) = match (position(from), position(to)) {
        (Some(start), Some(end)) => (start, end),
        _ => return Vec::new(),
    };
    all_simple_paths::<Vec<_>, _, RandomState>(&sub, start, end, 0, None)
        .map(|path| path.into_iter().map(|i| sub[i]).collect())
        .collect()
}

/// Find the maximum-cost path from `from` to `to` by exhaustive
/// enumeration. Among paths of equal cost, the first one enumerated
/// wins. Returns the path's cost and its nodes, or `None` if `to` is not
/// reachable from `from` (within `scope`).
pub fn longest_path(
    dag: &DagTask,
    from: NodeId,
    to: NodeId,
    scope: Option<&NodeSet>,
) -> Option<(Service, Vec<NodeId>)> {
    let mut best: Option<(Service, Vec<NodeId>)> = None;
    for path in paths(dag, from, to, scope) {
        let length = dag.cost_of(path.iter().copied());
        if best.as_ref().map_or(true, |(longest, _)| length > *longest) {
            best = Some((length, path));
        }
    }
    best
}

/// The nodes of `scope` without a predecessor in `scope`.
pub fn local_sources(dag: &DagTask, scope: &NodeSet) -> Vec<NodeId> {
    scope
        .iter()
        .filter(|v| !dag.predecessors(*v).any(|u| scope.contains(u)))
        .collect()
}

/// The nodes of `scope` without a successor in `scope`.
pub fn local_sinks(dag: &DagTask, scope: &NodeSet) -> Vec<NodeId> {
    scope
        .iter()
        .filter(|v| !dag.successors(*v).any(|w| scope.contains(w)))
        .collect()
}

/// The longest path of the sub-DAG induced by `scope`, trying all
/// local source/sink pairs in ascending order.
pub fn local_critical_path(dag: &DagTask, scope: &NodeSet) -> Option<(Service, Vec<NodeId>)> {
    let sinks = local_sinks(dag, scope);
    let mut best: Option<(Service, Vec<NodeId>)> = None;
    for source in local_sources(dag, scope) {
        for sink in sinks.iter().filter(|s| **s >= source) {
            if let Some((length, path)) = longest_path(dag, source, *sink, Some(scope)) {
                if best.as_ref().map_or(true, |(longest, _)| length > *longest) {
                    best = Some((length, path));
                }
            }
        }
    }
    best
}

/// The predecessors of `node` that lie within `scope`, ascending.
pub fn predecessors_within<'a>(
    dag: &'a DagTask,
    node: NodeId,
    scope: &'a NodeSet,
) -> impl Iterator<Item = NodeId> + 'a {
    dag.predecessors(node)
        .filter(move |u| scope.contains(*u))
        .sorted()
}

/// The nodes a depth-first search from `node` reaches, excluding
/// `node` itself.
fn reachable<G>(graph: G, node: NodeId) -> NodeSet
where
    G: IntoNeighbors + Visitable<Map = FixedBitSet> + GraphBase<NodeId = NodeIndex>,
{
    let mut dfs = Dfs::new(graph, node.into());
    while dfs.next(graph).is_some() {}
    let mut found = NodeSet::from(dfs.discovered);
    found.remove(node);
    found
}

/// All nodes from which `node` is reachable. Empty for the source.
pub fn ancestors(dag: &DagTask, node: NodeId) -> NodeSet {
    reachable(Reversed(dag.graph()), node)
}

/// All nodes reachable from `node`. Empty for the sink.
pub fn descendants(dag: &DagTask, node: NodeId) -> NodeSet {
    reachable(dag.graph(), node)
}

/// All nodes that are neither ancestors nor descendants of `node`, nor
/// `node` itself.
pub fn concurrent_nodes(dag: &DagTask, node: NodeId) -> NodeSet {
    let mut concurrent = NodeSet::full(dag.node_count());
    concurrent.difference_with(&ancestors(dag, node));
    concurrent.difference_with(&descendants(dag, node));
    concurrent.remove(node);
    concurrent
}
