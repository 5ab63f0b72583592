/*! The DAG task model

A [DagTask] is a single real-time job given as a directed acyclic graph
of sub-computations ("nodes") with worst-case execution costs and
precedence constraints. Nodes are numbered `1..=N` in a topological
order: node `1` is the unique source and node `N` the unique sink.

The task is immutable once built. It is stored as a `petgraph` graph
whose node weights are the costs, with node `v` at graph index
[NodeId::index]. Every algorithm that needs to "remove" nodes works on
a [NodeSet][crate::graph::NodeSet] mask over this graph instead of on a
copy of it.
*/

use derive_more::{Display, From, Into};
use itertools::Itertools;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction::{self, Incoming, Outgoing};
use thiserror::Error;

use crate::graph::{self, NodeSet};
use crate::time::{Duration, Service};

mod scaling;

/// Identifier of a node within a [DagTask].
///
/// Identifiers are 1-based and follow the topological numbering of the
/// task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Display)]
#[display(fmt = "v{}", _0)]
pub struct NodeId(usize);

impl NodeId {
    /// The source node of every task.
    pub const SOURCE: NodeId = NodeId(1);

    /// Create the identifier of the node numbered `id`.
    pub const fn new(id: usize) -> Self {
        NodeId(id)
    }

    /// The 1-based node number.
    pub fn id(self) -> usize {
        self.0
    }

    /// The 0-based slot of this node in per-node tables.
    ///
    /// Node `0` does not exist; its slot lies past the end of every
    /// table, so lookups with `get` miss.
    pub fn index(self) -> usize {
        self.0.wrapping_sub(1)
    }

    /// Inverse of [NodeId::index].
    pub fn from_index(index: usize) -> Self {
        NodeId(index + 1)
    }
}

impl From<NodeIndex> for NodeId {
    fn from(index: NodeIndex) -> Self {
        NodeId::from_index(index.index())
    }
}

impl From<NodeId> for NodeIndex {
    fn from(node: NodeId) -> Self {
        NodeIndex::new(node.index())
    }
}

/// Errors raised when a task violates the structural invariants of the
/// model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("a DAG task needs at least one node")]
    Empty,

    #[error("node {id} does not exist in a task with {node_count} nodes")]
    UnknownNode { id: usize, node_count: usize },

    /// Edges must point from a lower to a higher node number. This
    /// rules out self loops and cycles.
    #[error("edge {from} -> {to} contradicts the topological numbering")]
    BackwardEdge { from: NodeId, to: NodeId },

    #[error("node 1 must be the only source, found [{}]", .sources.iter().join(", "))]
    NotSingleSource { sources: Vec<NodeId> },

    #[error("node N must be the only sink, found [{}]", .sinks.iter().join(", "))]
    NotSingleSink { sinks: Vec<NodeId> },

    #[error("the sink is not reachable from the source")]
    SinkUnreachable,

    #[error("critical ratio {ratio} cannot be realized for this task")]
    InvalidCriticalRatio { ratio: f64 },

    #[error(
        "rescaling moved the critical path from [{}] to [{}]",
        .before.iter().join(", "),
        .after.iter().join(", ")
    )]
    CriticalPathShifted {
        before: Vec<NodeId>,
        after: Vec<NodeId>,
    },
}

/// Optional periodic release parameters of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Minimum separation of two consecutive releases.
    pub period: Duration,
    /// Relative deadline of each release.
    pub deadline: Duration,
}

impl Timing {
    /// Periodic release with the deadline equal to the period.
    pub fn implicit(period: Duration) -> Self {
        Timing {
            period,
            deadline: period,
        }
    }
}

/// The maximum-cost path from source to sink (usually written λ).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalPath {
    nodes: Vec<NodeId>,
    length: Service,
    members: NodeSet,
}

impl CriticalPath {
    fn of(task: &DagTask) -> Result<Self, ModelError> {
        let (length, nodes) = graph::longest_path(task, task.source(), task.sink(), None)
            .ok_or(ModelError::SinkUnreachable)?;
        let members = NodeSet::from_nodes(task.node_count(), nodes.iter().copied());
        Ok(CriticalPath {
            nodes,
            length,
            members,
        })
    }

    /// The nodes of the path in precedence order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The total cost `L` of the path.
    pub fn length(&self) -> Service {
        self.length
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(node)
    }

    /// The path's nodes as a set.
    pub fn members(&self) -> &NodeSet {
        &self.members
    }
}

/// A DAG task: per-node costs, precedence edges, and the derived
/// critical path.
#[derive(Debug, Clone)]
pub struct DagTask {
    graph: DiGraph<Service, ()>,
    critical_path: CriticalPath,
    timing: Option<Timing>,
}

impl DagTask {
    /// Build a task from the costs of nodes `1..=costs.len()` and a list
    /// of `(from, to)` precedence edges given as node numbers.
    ///
    /// Neighbors keep the order in which their edges are listed;
    /// duplicate edges are ignored. The critical path is determined
    /// once, by exhaustive enumeration.
    pub fn new<E>(costs: Vec<Service>, edges: E) -> Result<Self, ModelError>
    where
        E: IntoIterator<Item = (usize, usize)>,
    {
        let node_count = costs.len();
        if node_count == 0 {
            return Err(ModelError::Empty);
        }
        let checked = |id: usize| {
            if (1..=node_count).contains(&id) {
                Ok(NodeId(id))
            } else {
                Err(ModelError::UnknownNode { id, node_count })
            }
        };

        let mut listed = Vec::new();
        for (from, to) in edges {
            let (from, to) = (checked(from)?, checked(to)?);
            if from >= to {
                return Err(ModelError::BackwardEdge { from, to });
            }
            listed.push((from, to));
        }

        let mut graph: DiGraph<Service, ()> = DiGraph::with_capacity(node_count, listed.len());
        for cost in costs {
            graph.add_node(cost);
        }
        // petgraph walks the edges of a node from the most recently added
        // one, so adding them in reverse keeps the listed order
        let unique: Vec<(NodeId, NodeId)> = listed.into_iter().unique().collect();
        for (from, to) in unique.into_iter().rev() {
            graph.add_edge(from.into(), to.into(), ());
        }

        let sources: Vec<NodeId> = graph.externals(Incoming).map(NodeId::from).sorted().collect();
        if sources != [NodeId::SOURCE] {
            return Err(ModelError::NotSingleSource { sources });
        }
        let sinks: Vec<NodeId> = graph.externals(Outgoing).map(NodeId::from).sorted().collect();
        if sinks != [NodeId(node_count)] {
            return Err(ModelError::NotSingleSink { sinks });
        }

        let mut task = DagTask {
            graph,
            critical_path: CriticalPath {
                nodes: Vec::new(),
                length: 0,
                members: NodeSet::empty(node_count),
            },
            timing: None,
        };
        task.critical_path = CriticalPath::of(&task)?;
        Ok(task)
    }

    /// Attach periodic release parameters.
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// All nodes in ascending (topological) order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + Clone {
        (1..=self.node_count()).map(NodeId)
    }

    pub fn source(&self) -> NodeId {
        NodeId::SOURCE
    }

    pub fn sink(&self) -> NodeId {
        NodeId(self.node_count())
    }

    /// Worst-case execution cost `C(v)`.
    pub fn cost(&self, node: NodeId) -> Service {
        self.graph[NodeIndex::from(node)]
    }

    /// Total cost of the given nodes.
    pub fn cost_of<I>(&self, nodes: I) -> Service
    where
        I: IntoIterator<Item = NodeId>,
    {
        nodes.into_iter().map(|v| self.cost(v)).sum()
    }

    /// The direct neighbors of `node` in `direction`, in the order
    /// their edges were listed.
    pub fn neighbors(
        &self,
        node: NodeId,
        direction: Direction,
    ) -> impl Iterator<Item = NodeId> + '_ {
        self.graph
            .neighbors_directed(node.into(), direction)
            .map(NodeId::from)
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors(node, Outgoing)
    }

    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors(node, Incoming)
    }

    /// The underlying graph; node `v` sits at index `v.index()`.
    pub fn graph(&self) -> &DiGraph<Service, ()> {
        &self.graph
    }

    /// The total work `W` of the task.
    pub fn volume(&self) -> Service {
        self.graph.node_weights().sum()
    }

    pub fn critical_path(&self) -> &CriticalPath {
        &self.critical_path
    }

    /// The nodes not on the critical path (`VN`).
    pub fn non_critical_nodes(&self) -> NodeSet {
        let mut rest = NodeSet::full(self.node_count());
        rest.difference_with(self.critical_path.members());
        rest
    }

    pub fn timing(&self) -> Option<Timing> {
        self.timing
    }

    pub fn is_periodic(&self) -> bool {
        self.timing.is_some()
    }

    /// `W / period`, if the task is periodic.
    pub fn utilization(&self) -> Option<f64> {
        self.timing
            .map(|t| self.volume() as f64 / t.period as f64)
    }

    /// `W / deadline`, if the task is periodic.
    pub fn density(&self) -> Option<f64> {
        self.timing
            .map(|t| self.volume() as f64 / t.deadline as f64)
    }
}
