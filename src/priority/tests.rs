use std::collections::HashSet;
use std::rc::Rc;

use proptest::prelude::*;

use super::tpds::Ranks;
use crate::dag::{DagTask, NodeId};
use crate::priority::{
    EligibilityOrdering, LevelCounter, PriorityAssignment, PriorityError, PriorityMap,
    TpdsOrdering, FLOOR,
};
use crate::tests::{chain_task, dag_tasks, example_task, fork_join_task, nodes};

fn levels(map: &PriorityMap, ids: &[usize]) -> Vec<usize> {
    nodes(ids).into_iter().map(|v| map.get(v).unwrap()).collect()
}

#[test]
fn eo_example() {
    let task = example_task();
    let map = EligibilityOrdering.assign(&task).unwrap();
    assert_eq!(map.critical_level(), 12);
    assert_eq!(levels(&map, &[1, 2, 6, 9, 11]), vec![12; 5]);
    assert_eq!(levels(&map, &[5, 3, 7, 10, 8, 4]), vec![11, 10, 9, 8, 7, 6]);
    assert_eq!(map.order(), nodes(&[5, 3, 7, 10, 8, 4]));
    assert!(map.is_critical(NodeId::new(9)));
    assert!(!map.is_critical(NodeId::new(10)));
    // node numbers start at 1
    assert_eq!(map.get(NodeId::new(0)), None);
    assert_eq!(map.get(NodeId::new(12)), None);
}

#[test]
fn tpds_example() {
    let task = example_task();
    let map = TpdsOrdering.assign(&task).unwrap();
    assert_eq!(levels(&map, &[1, 2, 6, 9, 11]), vec![12; 5]);
    assert_eq!(map.order(), nodes(&[5, 3, 7, 8, 10, 4]));
    assert_eq!(levels(&map, &[5, 3, 7, 8, 10, 4]), vec![11, 10, 9, 8, 7, 6]);
}

#[test]
fn tpds_path_lengths() {
    let task = example_task();
    let ranks = Ranks::of(&task);
    let l: Vec<_> = task.nodes().map(|v| ranks.length(&task, v)).collect();
    assert_eq!(l, vec![9, 22, 20, 9, 19, 22, 20, 18, 22, 20, 22]);
    assert_eq!(ranks.backward[0], 9);
    assert_eq!(ranks.backward[2], 19);
    assert_eq!(ranks.forward[8], 21);
}

#[test]
fn trivial_tasks() {
    for task in [chain_task(), fork_join_task()] {
        for map in [
            EligibilityOrdering.assign(&task).unwrap(),
            TpdsOrdering.assign(&task).unwrap(),
        ] {
            for v in task.critical_path().nodes() {
                assert!(map.is_critical(*v));
            }
        }
    }
    let map = TpdsOrdering.assign(&fork_join_task()).unwrap();
    assert_eq!(map.get(NodeId::new(3)), Some(4));
    assert_eq!(map.get(NodeId::new(5)), None);
}

#[test]
fn eo_orders_joining_branches_recursively() {
    // consumer {3, 4, 5, 6, 7}: 3 -> {4, 5} -> 6 and an independent 7
    let task = DagTask::new(
        vec![1, 20, 2, 5, 3, 4, 6, 1],
        [
            (1, 2),
            (1, 3),
            (1, 7),
            (2, 8),
            (3, 4),
            (3, 5),
            (4, 6),
            (5, 6),
            (6, 8),
            (7, 8),
        ],
    )
    .unwrap();
    assert_eq!(task.critical_path().nodes(), &nodes(&[1, 2, 8])[..]);
    let map = EligibilityOrdering.assign(&task).unwrap();
    // local critical path 3-4-6 (11) joins at 6: 3, 4 and 6 first, then
    // the gated node 5, then the unrelated node 7
    assert_eq!(map.order(), nodes(&[3, 4, 6, 5, 7]));
}

#[test]
fn traits_through_references() {
    let task = example_task();
    let by_ref: &dyn PriorityAssignment = &EligibilityOrdering;
    let boxed: Box<dyn PriorityAssignment> = Box::new(TpdsOrdering);
    let shared: Rc<dyn PriorityAssignment> = Rc::new(TpdsOrdering);
    assert_eq!(
        by_ref.assign(&task).unwrap(),
        EligibilityOrdering.assign(&task).unwrap()
    );
    assert_eq!(boxed.assign(&task).unwrap(), shared.assign(&task).unwrap());
}

#[test]
fn counter_stops_at_floor() {
    let task = chain_task();
    let mut counter = LevelCounter::new(&task);
    let v = NodeId::new(2);
    assert_eq!(counter.take(v), Ok(3));
    assert_eq!(counter.take(v), Ok(2));
    assert_eq!(counter.take(v), Ok(1));
    assert_eq!(counter.take(v), Err(PriorityError::CounterExhausted { node: v }));
    assert_eq!(FLOOR, 0);
}

fn check_bijection(task: &DagTask, map: &PriorityMap) -> Result<(), TestCaseError> {
    let mut seen = HashSet::new();
    for v in task.nodes() {
        let level = map.get(v);
        prop_assert!(level.is_some(), "{} has no level", v);
        let level = level.unwrap_or_default();
        if task.critical_path().contains(v) {
            prop_assert_eq!(level, map.critical_level());
        } else {
            prop_assert!(level > FLOOR && level < map.critical_level());
            prop_assert!(seen.insert(level), "level {} used twice", level);
        }
    }
    prop_assert_eq!(seen.len(), task.non_critical_nodes().len());
    Ok(())
}

proptest! {
    #[test]
    fn eo_is_a_deterministic_bijection(task in dag_tasks(10)) {
        let map = EligibilityOrdering.assign(&task).unwrap();
        check_bijection(&task, &map)?;
        prop_assert_eq!(map, EligibilityOrdering.assign(&task).unwrap());
    }

    #[test]
    fn tpds_is_a_deterministic_bijection(task in dag_tasks(10)) {
        let map = TpdsOrdering.assign(&task).unwrap();
        check_bijection(&task, &map)?;
        prop_assert_eq!(&map, &TpdsOrdering.assign(&task).unwrap());

        // assigned in a topological order
        for v in task.non_critical_nodes().iter() {
            for u in task.predecessors(v) {
                if !task.critical_path().contains(u) {
                    prop_assert!(map.get(u) > map.get(v));
                }
            }
        }
    }
}
