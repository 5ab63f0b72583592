/*! Provider/consumer decomposition of a DAG task

The critical path is split into *providers*: maximal runs of critical
nodes in which each node's only predecessor is the previous node of the
run. Every provider is paired with a *consumer*: the non-critical nodes
that must complete before the next provider can start. The consumer of
the last provider collects all remaining non-critical nodes.

The decomposition can also be taken of a sub-DAG (a [NodeSet] scope)
along any path within it, which the priority assignment uses to recurse
into consumers.
*/

use crate::dag::{DagTask, NodeId};
use crate::graph::{self, NodeSet};
use crate::time::Service;

/// Providers and consumers, index-aligned: `consumers[i]` is gated
/// between `providers[i]` and `providers[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    /// Runs of path nodes, in path order.
    pub providers: Vec<Vec<NodeId>>,
    /// Off-path node sets, each sorted ascending (possibly empty).
    pub consumers: Vec<Vec<NodeId>>,
}

impl Decomposition {
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Iterate over `(provider, consumer)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&[NodeId], &[NodeId])> {
        self.providers
            .iter()
            .zip(&self.consumers)
            .map(|(p, c)| (p.as_slice(), c.as_slice()))
    }

    /// `L_i`: the total cost of provider `i`.
    pub fn provider_cost(&self, dag: &DagTask, i: usize) -> Service {
        dag.cost_of(self.providers[i].iter().copied())
    }

    /// The total cost of consumer `i`.
    pub fn consumer_cost(&self, dag: &DagTask, i: usize) -> Service {
        dag.cost_of(self.consumers[i].iter().copied())
    }
}

/// Decompose the whole task along its critical path.
pub fn find_providers_consumers(dag: &DagTask) -> Decomposition {
    decompose_within(
        dag,
        dag.critical_path().nodes(),
        &NodeSet::full(dag.node_count()),
    )
}

/// Decompose the sub-DAG selected by `scope` along `path`, a path
/// within `scope`. Only predecessors inside `scope` are taken into
/// account, and only nodes of `scope` end up in consumers.
pub fn decompose_within(dag: &DagTask, path: &[NodeId], scope: &NodeSet) -> Decomposition {
    let on_path = NodeSet::from_nodes(dag.node_count(), path.iter().copied());
    let mut unassigned = scope.clone();
    unassigned.difference_with(&on_path);

    let mut providers = Vec::new();
    let mut consumers = Vec::new();
    let mut current = Vec::new();
    for (k, node) in path.iter().copied().enumerate() {
        if current.is_empty() {
            current.push(node);
        }
        match path.get(k + 1).copied() {
            Some(next) => {
                let gates: Vec<NodeId> = graph::predecessors_within(dag, next, scope).collect();
                if gates == [node] {
                    current.push(next);
                    continue;
                }
                providers.push(std::mem::take(&mut current));

                let mut consumer = NodeSet::empty(dag.node_count());
                for gate in gates.into_iter().filter(|u| !on_path.contains(*u)) {
                    consumer.extend(
                        graph::ancestors(dag, gate)
                            .iter()
                            .chain(Some(gate))
                            .filter(|v| unassigned.contains(*v)),
                    );
                }
                unassigned.difference_with(&consumer);
                consumers.push(consumer.iter().collect());
            }
            None => {
                providers.push(std::mem::take(&mut current));
                consumers.push(unassigned.iter().collect());
            }
        }
    }

    debug_assert_eq!(providers.len(), consumers.len());
    Decomposition {
        providers,
        consumers,
    }
}
