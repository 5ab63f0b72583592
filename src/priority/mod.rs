/*! Static priority assignment for non-critical nodes

Both algorithms in this module produce a [PriorityMap]: all nodes on the
critical path share one reserved level above every other level, and each
non-critical node receives a distinct level. Larger levels are more
eligible to run first.

- [EligibilityOrdering] recursively decomposes consumers along their
  local critical paths.
- [TpdsOrdering] repeatedly picks the ready node with the longest
  greedy path through it and follows its successors depth-first.

Levels are handed out by a [LevelCounter] that counts down from the
number of nodes and is passed explicitly through the recursion.
*/

use auto_impl::auto_impl;
use itertools::Itertools;
use thiserror::Error;
use tracing::trace;

use crate::dag::{DagTask, NodeId};

mod eligibility;
mod tpds;

pub use eligibility::EligibilityOrdering;
pub use tpds::TpdsOrdering;

/// A priority level; larger means more eligible.
pub type Priority = usize;

/// No valid level is at or below this value.
pub const FLOOR: Priority = 0;

/// Errors indicating that an assignment algorithm broke one of its own
/// invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriorityError {
    #[error("no priority level was assigned to [{}]", .nodes.iter().join(", "))]
    UnassignedNodes { nodes: Vec<NodeId> },

    #[error("no node of [{}] has all its predecessors assigned", .scope.iter().join(", "))]
    NoEligibleNode { scope: Vec<NodeId> },

    #[error("priority levels exhausted when assigning {node}")]
    CounterExhausted { node: NodeId },

    #[error("no progress while ordering [{}]", .scope.iter().join(", "))]
    StalledRecursion { scope: Vec<NodeId> },
}

/// The interface shared by the priority assignment algorithms.
#[auto_impl(&, Box, Rc)]
pub trait PriorityAssignment {
    /// Compute a priority level for every node of `dag`.
    ///
    /// Implementations are deterministic: the same task always yields
    /// the same map.
    fn assign(&self, dag: &DagTask) -> Result<PriorityMap, PriorityError>;
}

/// The result of a priority assignment: one level per node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityMap {
    levels: Vec<Option<Priority>>,
    critical: Priority,
}

impl PriorityMap {
    /// The level shared by all critical-path nodes.
    pub fn critical_level(&self) -> Priority {
        self.critical
    }

    /// The level of `node`, if it has one.
    pub fn get(&self, node: NodeId) -> Option<Priority> {
        self.levels.get(node.index()).copied().flatten()
    }

    pub fn is_critical(&self, node: NodeId) -> bool {
        self.get(node) == Some(self.critical)
    }

    /// All `(node, level)` pairs in node order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Priority)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .filter_map(|(i, level)| level.map(|l| (NodeId::from_index(i), l)))
    }

    /// The non-critical nodes from the highest to the lowest level.
    pub fn order(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, level)| *level != self.critical)
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .map(|(v, _)| v)
            .collect()
    }
}

/// Hands out strictly decreasing levels, starting from the node count.
#[derive(Debug)]
pub struct LevelCounter {
    next: Priority,
}

impl LevelCounter {
    pub fn new(dag: &DagTask) -> Self {
        LevelCounter {
            next: dag.node_count(),
        }
    }

    /// Take the next level for `node`.
    pub fn take(&mut self, node: NodeId) -> Result<Priority, PriorityError> {
        if self.next <= FLOOR {
            return Err(PriorityError::CounterExhausted { node });
        }
        let level = self.next;
        self.next -= 1;
        Ok(level)
    }
}

/// A priority map under construction.
struct Levels<'a> {
    dag: &'a DagTask,
    levels: Vec<Option<Priority>>,
}

impl<'a> Levels<'a> {
    fn new(dag: &'a DagTask) -> Self {
        Levels {
            dag,
            levels: vec![None; dag.node_count()],
        }
    }

    fn critical_level(&self) -> Priority {
        self.dag.node_count() + 1
    }

    fn is_assigned(&self, node: NodeId) -> bool {
        self.levels[node.index()].is_some()
    }

    /// Give `node` the critical level if it is on the critical path and
    /// the next counter level otherwise. Assigned nodes keep their level.
    fn assign(&mut self, node: NodeId, counter: &mut LevelCounter) -> Result<(), PriorityError> {
        if self.is_assigned(node) {
            return Ok(());
        }
        let level = if self.dag.critical_path().contains(node) {
            self.critical_level()
        } else {
            counter.take(node)?
        };
        trace!(node = %node, level, "assigned priority");
        self.levels[node.index()] = Some(level);
        Ok(())
    }

    /// The nodes among `nodes` that are still unassigned.
    fn missing<I>(&self, nodes: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        nodes
            .into_iter()
            .filter(|v| !self.is_assigned(*v))
            .collect()
    }

    fn finish(self) -> Result<PriorityMap, PriorityError> {
        let missing = self.missing(self.dag.nodes());
        if !missing.is_empty() {
            return Err(PriorityError::UnassignedNodes { nodes: missing });
        }
        Ok(PriorityMap {
            critical: self.critical_level(),
            levels: self.levels,
        })
    }
}

#[cfg(test)]
mod tests;
