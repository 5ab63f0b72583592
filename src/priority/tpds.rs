use std::cmp::Ordering;

use petgraph::Direction::{self, Incoming, Outgoing};

use super::{LevelCounter, Levels, PriorityAssignment, PriorityError, PriorityMap};
use crate::dag::{DagTask, NodeId};
use crate::graph::{self, NodeSet};
use crate::time::Service;

/// TPDS ordering.
///
/// Every node `v` is ranked by the length `l(v) = lf(v) + lb(v) - C(v)`
/// of a greedy path through it, where `lf` follows the most expensive
/// predecessor back to the source and `lb` the most expensive successor
/// forward to the sink. Among the nodes whose predecessors are all
/// assigned, the one with the largest `l` (then the largest `lb`, then
/// the smallest id) is assigned next, after which its successors are
/// placed depth-first in the same rank order. A successor with
/// unassigned ancestors first has those ancestors ordered as a sub-DAG
/// of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct TpdsOrdering;

impl PriorityAssignment for TpdsOrdering {
    fn assign(&self, dag: &DagTask) -> Result<PriorityMap, PriorityError> {
        let mut state = Tpds {
            dag,
            ranks: Ranks::of(dag),
            levels: Levels::new(dag),
        };
        let mut counter = LevelCounter::new(dag);
        state.assign_within(&NodeSet::full(dag.node_count()), &mut counter)?;
        state.levels.finish()
    }
}

/// Greedy path lengths through each node.
#[derive(Debug)]
pub(super) struct Ranks {
    pub(super) forward: Vec<Service>,
    pub(super) backward: Vec<Service>,
}

impl Ranks {
    pub(super) fn of(dag: &DagTask) -> Self {
        Ranks {
            forward: dag
                .nodes()
                .map(|v| greedy_walk(dag, v, Incoming))
                .collect(),
            backward: dag
                .nodes()
                .map(|v| greedy_walk(dag, v, Outgoing))
                .collect(),
        }
    }

    /// `l(v)`
    pub(super) fn length(&self, dag: &DagTask, node: NodeId) -> Service {
        self.forward[node.index()] + self.backward[node.index()] - dag.cost(node)
    }

    /// Orders more urgent nodes first.
    fn compare(&self, dag: &DagTask, a: NodeId, b: NodeId) -> Ordering {
        self.length(dag, b)
            .cmp(&self.length(dag, a))
            .then(self.backward[b.index()].cmp(&self.backward[a.index()]))
            .then(a.cmp(&b))
    }
}

/// Cost of the path from `node` that always steps to the most expensive
/// neighbor in `direction` (the smallest id among equals).
fn greedy_walk(dag: &DagTask, node: NodeId, direction: Direction) -> Service {
    let mut total = dag.cost(node);
    let mut current = node;
    while let Some(next) = dag
        .neighbors(current, direction)
        .max_by(|a, b| dag.cost(*a).cmp(&dag.cost(*b)).then(b.cmp(a)))
    {
        total += dag.cost(next);
        current = next;
    }
    total
}

struct Tpds<'a> {
    dag: &'a DagTask,
    ranks: Ranks,
    levels: Levels<'a>,
}

impl Tpds<'_> {
    /// Assign every node of `scope`, always starting from the most
    /// urgent node whose predecessors are all assigned.
    fn assign_within(
        &mut self,
        scope: &NodeSet,
        counter: &mut LevelCounter,
    ) -> Result<(), PriorityError> {
        loop {
            let pending = self.levels.missing(scope.iter());
            if pending.is_empty() {
                return Ok(());
            }
            let next = pending
                .iter()
                .copied()
                .filter(|v| {
                    self.dag
                        .predecessors(*v)
                        .all(|u| self.levels.is_assigned(u))
                })
                .min_by(|a, b| self.ranks.compare(self.dag, *a, *b));
            match next {
                Some(node) => self.place(node, scope, counter)?,
                None => return Err(PriorityError::NoEligibleNode { scope: pending }),
            }
        }
    }

    /// Assign `node` once its ancestors are assigned, then follow its
    /// successors within `scope`.
    fn place(
        &mut self,
        node: NodeId,
        scope: &NodeSet,
        counter: &mut LevelCounter,
    ) -> Result<(), PriorityError> {
        if self.levels.is_assigned(node) {
            return Ok(());
        }
        let ancestors = graph::ancestors(self.dag, node);
        let unresolved = self.levels.missing(ancestors.iter());
        if !unresolved.is_empty() {
            let sub_scope = NodeSet::from_nodes(self.dag.node_count(), unresolved);
            self.assign_within(&sub_scope, counter)?;
        }
        self.levels.assign(node, counter)?;

        let mut successors: Vec<NodeId> = self
            .dag
            .successors(node)
            .filter(|v| scope.contains(*v))
            .collect();
        successors.sort_by(|a, b| self.ranks.compare(self.dag, *a, *b));
        for successor in successors {
            self.place(successor, scope, counter)?;
        }
        Ok(())
    }
}
