use fixedbitset::{FixedBitSet, Ones};

use crate::dag::NodeId;

/// A set of nodes of one task, stored as a bitmask over the task's
/// graph indices.
///
/// Every set has a fixed universe (the task's node count); iteration
/// always yields nodes in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    bits: FixedBitSet,
}

impl NodeSet {
    pub fn empty(universe: usize) -> Self {
        NodeSet {
            bits: FixedBitSet::with_capacity(universe),
        }
    }

    /// The set of all nodes `1..=universe`.
    pub fn full(universe: usize) -> Self {
        let mut bits = FixedBitSet::with_capacity(universe);
        bits.insert_range(..);
        NodeSet { bits }
    }

    pub fn from_nodes<I>(universe: usize, nodes: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut set = NodeSet::empty(universe);
        set.extend(nodes);
        set
    }

    /// The number of nodes of the task this set ranges over.
    pub fn universe(&self) -> usize {
        self.bits.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.bits.contains(node.index())
    }

    /// Add `node`; returns whether it was absent before.
    pub fn insert(&mut self, node: NodeId) -> bool {
        debug_assert!(
            node.index() < self.universe(),
            "{} outside of the node universe",
            node
        );
        !self.bits.put(node.index())
    }

    /// Drop `node`; returns whether it was present before.
    pub fn remove(&mut self, node: NodeId) -> bool {
        let present = self.contains(node);
        if present {
            self.bits.set(node.index(), false);
        }
        present
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones(..)
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// The smallest node in the set.
    pub fn first(&self) -> Option<NodeId> {
        self.iter().next()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            ones: self.bits.ones(),
        }
    }

    pub fn union_with(&mut self, other: &NodeSet) {
        self.bits.union_with(&other.bits);
    }

    pub fn intersect_with(&mut self, other: &NodeSet) {
        self.bits.intersect_with(&other.bits);
    }

    pub fn difference_with(&mut self, other: &NodeSet) {
        self.bits.difference_with(&other.bits);
    }

    pub fn is_subset(&self, other: &NodeSet) -> bool {
        self.bits.is_subset(&other.bits)
    }
}

/// Graph traversals mark visited nodes in a bitset over the same
/// indices.
impl From<FixedBitSet> for NodeSet {
    fn from(bits: FixedBitSet) -> Self {
        NodeSet { bits }
    }
}

impl Extend<NodeId> for NodeSet {
    fn extend<I: IntoIterator<Item = NodeId>>(&mut self, nodes: I) {
        for node in nodes {
            self.insert(node);
        }
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = NodeId;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Ascending iterator over the members of a [NodeSet].
pub struct Iter<'a> {
    ones: Ones<'a>,
}

impl Iterator for Iter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        self.ones.next().map(NodeId::from_index)
    }
}
