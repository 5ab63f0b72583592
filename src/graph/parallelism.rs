use std::iter;

use super::{descendants, NodeSet};
use crate::dag::{DagTask, NodeId};

/// A maximum matching in the bipartite graph of the reachability
/// relation restricted to a node set.
struct Matching {
    members: Vec<NodeId>,
    // for every member, the member matched to it as its predecessor
    matched: Vec<Option<usize>>,
}

impl Matching {
    fn of(dag: &DagTask, nodes: &NodeSet) -> Self {
        let members: Vec<_> = nodes.iter().collect();
        let reachable: Vec<Vec<usize>> = members
            .iter()
            .map(|u| {
                let below = descendants(dag, *u);
                members
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| below.contains(**v))
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        let mut matched = vec![None; members.len()];
        for left in 0..members.len() {
            let mut visited = vec![false; members.len()];
            augment(left, &reachable, &mut matched, &mut visited);
        }
        Matching { members, matched }
    }

    fn size(&self) -> usize {
        self.matched.iter().flatten().count()
    }
}

// Kuhn's augmenting path search.
fn augment(
    left: usize,
    reachable: &[Vec<usize>],
    matched: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &right in &reachable[left] {
        if !visited[right] {
            visited[right] = true;
            let free = match matched[right] {
                None => true,
                Some(other) => augment(other, reachable, matched, visited),
            };
            if free {
                matched[right] = Some(left);
                return true;
            }
        }
    }
    false
}

/// The size of the largest antichain within `nodes`, i.e., the maximum
/// number of nodes of the set that are pairwise concurrent in `dag`.
///
/// Concurrency is judged on the whole task, so two members connected
/// only through nodes outside the set are still ordered. By Dilworth's
/// theorem the width equals the size of a minimum chain cover, which
/// is `|nodes|` minus a maximum matching in the bipartite graph of the
/// reachability relation restricted to `nodes`.
pub fn antichain_width(dag: &DagTask, nodes: &NodeSet) -> usize {
    let matching = Matching::of(dag, nodes);
    matching.members.len() - matching.size()
}

/// Split `nodes` into as few chains as possible. Each chain lists
/// nodes that are pairwise ordered in `dag`, in precedence order, so
/// no two of them ever run at the same time. Chains are sorted by
/// their first node.
pub fn chain_cover(dag: &DagTask, nodes: &NodeSet) -> Vec<Vec<NodeId>> {
    let Matching { members, matched } = Matching::of(dag, nodes);
    let mut next = vec![None; members.len()];
    for (right, left) in matched.iter().enumerate() {
        if let Some(left) = left {
            next[*left] = Some(right);
        }
    }
    (0..members.len())
        .filter(|i| matched[*i].is_none())
        .map(|start| {
            iter::successors(Some(start), |i| next[*i])
                .map(|i| members[i])
                .collect()
        })
        .collect()
}

/// Check whether `n` cores always suffice to run every node of `nodes`
/// as soon as it becomes ready, i.e., whether no more than `n - 1` of
/// them can ever be pending at the same time.
///
/// Returns true iff the largest antichain within `nodes` has fewer than
/// `n` members. The result is monotone in `n`.
pub fn test_parallelism(dag: &DagTask, nodes: &NodeSet, n: usize) -> bool {
    antichain_width(dag, nodes) < n
}
