use super::{LevelCounter, Levels, PriorityAssignment, PriorityError, PriorityMap};
use crate::dag::DagTask;
use crate::decomposition::{self, decompose_within};
use crate::graph::{self, NodeSet};

/// Eligibility Ordering (EO).
///
/// The task is decomposed into providers and consumers; provider nodes
/// take the critical level. Each consumer is then ordered along its own
/// local critical path: if that path joins other work of the consumer
/// (some node has more than one predecessor in the consumer), the
/// consumer is decomposed along the path and the pieces are ordered
/// recursively; otherwise the path's nodes take the next levels and the
/// rest of the consumer is ordered in the same way.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityOrdering;

impl PriorityAssignment for EligibilityOrdering {
    fn assign(&self, dag: &DagTask) -> Result<PriorityMap, PriorityError> {
        let mut levels = Levels::new(dag);
        let mut counter = LevelCounter::new(dag);

        let decomposition = decomposition::find_providers_consumers(dag);
        for provider in &decomposition.providers {
            for node in provider {
                levels.assign(*node, &mut counter)?;
            }
        }
        for consumer in &decomposition.consumers {
            let scope = NodeSet::from_nodes(dag.node_count(), consumer.iter().copied());
            order_consumer(dag, scope, &mut levels, &mut counter)?;
        }

        levels.finish()
    }
}

/// Assign levels to every node of `scope`.
fn order_consumer(
    dag: &DagTask,
    scope: NodeSet,
    levels: &mut Levels,
    counter: &mut LevelCounter,
) -> Result<(), PriorityError> {
    let mut remaining = scope;
    while !remaining.is_empty() {
        let path = match graph::local_critical_path(dag, &remaining) {
            Some((_, path)) if !path.is_empty() => path,
            _ => {
                return Err(PriorityError::StalledRecursion {
                    scope: remaining.iter().collect(),
                })
            }
        };

        let joins = path
            .iter()
            .any(|v| graph::predecessors_within(dag, *v, &remaining).count() > 1);
        if !joins {
            for node in &path {
                levels.assign(*node, counter)?;
                remaining.remove(*node);
            }
            continue;
        }

        let pieces = decompose_within(dag, &path, &remaining);
        for node in pieces.providers.iter().flatten() {
            levels.assign(*node, counter)?;
        }
        for consumer in pieces.consumers {
            let sub_scope = NodeSet::from_nodes(dag.node_count(), consumer);
            // the path is never part of a sub-consumer
            if sub_scope.len() >= remaining.len() {
                return Err(PriorityError::StalledRecursion {
                    scope: remaining.iter().collect(),
                });
            }
            order_consumer(dag, sub_scope, levels, counter)?;
        }

        let missing = levels.missing(remaining.iter());
        if !missing.is_empty() {
            return Err(PriorityError::UnassignedNodes { nodes: missing });
        }
        break;
    }
    Ok(())
}
