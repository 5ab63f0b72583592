use proptest::prelude::*;

use crate::analysis::{self, AnalysisError, Case};
use crate::priority::{EligibilityOrdering, PriorityAssignment, TpdsOrdering};
use crate::simulation::{self, DispatchPolicy, ExecutionModel, SimulationConfig};
use crate::tests::{chain_task, dag_tasks, example_task, fork_join_task, init_tracing, nodes};
use crate::time::Duration;
use crate::{DagTask, NodeId};

const EXECUTION_MODELS: [ExecutionModel; 3] = [
    ExecutionModel::Exact,
    ExecutionModel::UniformHalf,
    ExecutionModel::UniformFull,
];

/// The largest makespan observed over `seeds` runs per execution model.
fn worst_makespan(task: &DagTask, cores: usize, policy: DispatchPolicy, seeds: u64) -> Duration {
    let mut worst = 0;
    for execution in EXECUTION_MODELS {
        for seed in 0..seeds {
            let config = SimulationConfig::new(cores, policy)
                .with_execution(execution)
                .with_seed(seed);
            let schedule = simulation::simulate(task, &config).unwrap();
            worst = worst.max(schedule.makespan);
        }
    }
    worst
}

#[test]
fn classic_bound_example() {
    let task = example_task();
    // L = 22, W = 52
    assert_eq!(analysis::classic_bound(&task, 1), Ok(52));
    assert_eq!(analysis::classic_bound(&task, 2), Ok(37));
    assert_eq!(analysis::classic_bound(&task, 3), Ok(32));
    assert_eq!(analysis::classic_bound(&task, 4), Ok(30));
    assert_eq!(analysis::classic_bound(&task, 100), Ok(23));
    assert_eq!(analysis::classic_bound(&task, 0), Err(AnalysisError::NoCores));
}

#[test]
fn example_on_four_cores() {
    init_tracing();
    let task = example_task();
    let bound = analysis::alpha_beta_bound(&task, 4, None).unwrap();

    let expected_finish = [1, 6, 7, 16, 18, 12, 15, 14, 27, 23, 28];
    for (v, f) in task.nodes().zip(expected_finish) {
        assert_eq!(bound.finish_time(v), Some(f), "finish time of {}", v);
    }

    assert_eq!(bound.alphas(), vec![0, 27, 0]);
    assert_eq!(bound.betas(), vec![3, 0, 0]);
    let p = &bound.providers[0];
    assert_eq!(p.case, Case::Delayed);
    assert_eq!(p.length, 12);
    assert_eq!(p.workload, 15);
    assert_eq!(p.finish_time, 12);
    assert_eq!(p.delay_chain, vec![NodeId::new(5)]);
    assert_eq!(p.response_time, 15);
    assert_eq!(bound.providers[1].case, Case::NoDelay);
    assert_eq!(bound.providers[1].response_time, 9);
    assert_eq!(bound.providers[2].response_time, 1);
    assert_eq!(bound.response_time, 25);
    assert_eq!(bound.finish_time(NodeId::new(0)), None);
    assert_eq!(bound.finish_time(NodeId::new(12)), None);
}

#[test]
fn example_with_priorities_on_four_cores() {
    let task = example_task();
    let eo = EligibilityOrdering.assign(&task).unwrap();
    let bound = analysis::alpha_beta_bound(&task, 4, Some(&eo)).unwrap();

    let expected_finish = [1, 6, 7, 16, 16, 12, 15, 14, 25, 23, 26];
    for (v, f) in task.nodes().zip(expected_finish) {
        assert_eq!(bound.finish_time(v), Some(f), "finish time of {}", v);
    }
    assert_eq!(bound.betas(), vec![3, 0, 0]);
    assert_eq!(
        bound
            .providers
            .iter()
            .map(|p| p.response_time)
            .collect::<Vec<_>>(),
        vec![15, 9, 1]
    );
    assert_eq!(bound.response_time, 25);

    let tpds = TpdsOrdering.assign(&task).unwrap();
    let bound = analysis::alpha_beta_bound(&task, 4, Some(&tpds)).unwrap();
    assert_eq!(bound.finish_time(NodeId::new(5)), Some(16));
    assert_eq!(bound.response_time, 25);
}

#[test]
fn credit_ceiling_is_enforced() {
    // consumer {3, 4, 7, 8, 10} (27 units) cannot all run on one spare
    // core while the 9-unit provider {9} executes
    let task = example_task();
    assert_eq!(
        analysis::alpha_beta_bound(&task, 2, None),
        Err(AnalysisError::CreditCeilingExceeded {
            provider: 1,
            alpha: 27,
            ceiling: 9,
        })
    );
}

#[test]
fn fork_join_is_bounded_by_its_critical_path() {
    let task = fork_join_task();
    let bound = analysis::alpha_beta_bound(&task, 2, None).unwrap();
    assert_eq!(bound.finish_time(NodeId::new(3)), Some(4));
    assert_eq!(bound.providers[0].case, Case::NoDelay);
    assert_eq!(bound.alphas(), vec![3, 0]);
    assert_eq!(bound.response_time, 7);
    assert_eq!(analysis::classic_bound(&task, 2), Ok(9));

    let eo = EligibilityOrdering.assign(&task).unwrap();
    assert_eq!(
        analysis::alpha_beta_bound(&task, 2, Some(&eo)).map(|b| b.response_time),
        Ok(7)
    );
}

#[test]
fn chain_needs_no_parallelism() {
    let task = chain_task();
    for m in 1..4 {
        let bound = analysis::alpha_beta_bound(&task, m, None).unwrap();
        assert_eq!(bound.response_time, 6);
        assert_eq!(analysis::classic_bound(&task, m), Ok(6));
    }
}

#[test]
fn single_core_serializes_everything() {
    let task = example_task();
    let bound = analysis::alpha_beta_bound(&task, 1, None).unwrap();
    assert_eq!(bound.response_time, 52);
    assert_eq!(
        bound
            .providers
            .iter()
            .map(|p| (p.workload, p.finish_time))
            .collect::<Vec<_>>(),
        vec![(15, 12), (36, 24), (1, 52)]
    );
    assert_eq!(bound.finish_time(NodeId::new(5)), None);

    let eo = EligibilityOrdering.assign(&task).unwrap();
    assert_eq!(
        analysis::alpha_beta_bound(&task, 1, Some(&eo)).map(|b| b.response_time),
        Ok(52)
    );
}

#[test]
fn analysis_errors() {
    let task = example_task();
    assert_eq!(
        analysis::alpha_beta_bound(&task, 0, None),
        Err(AnalysisError::NoCores)
    );
    // a priority map of another task leaves nodes without a level
    let foreign = EligibilityOrdering.assign(&fork_join_task()).unwrap();
    assert_eq!(
        analysis::alpha_beta_bound(&task, 4, Some(&foreign)),
        Err(AnalysisError::MissingPriority {
            node: NodeId::new(5)
        })
    );
}

#[test]
fn bound_covers_simulated_makespans() {
    let task = example_task();
    let bound = analysis::alpha_beta_bound(&task, 4, None).unwrap();
    assert_eq!(bound.response_time, 25);

    let worst = worst_makespan(&task, 4, DispatchPolicy::Random, 1000);
    assert!(worst <= bound.response_time, "observed makespan {}", worst);
}

#[test]
fn work_conserving_example() {
    init_tracing();
    let task = example_task();
    assert_eq!(analysis::work_conserving_bound(&task, 4), Ok(24));
    assert_eq!(analysis::work_conserving_bound(&task, 1), Ok(52));
    assert_eq!(analysis::work_conserving_bound(&fork_join_task(), 2), Ok(7));
    assert_eq!(analysis::work_conserving_bound(&chain_task(), 3), Ok(6));
    assert_eq!(
        analysis::work_conserving_bound(&task, 0),
        Err(AnalysisError::NoCores)
    );
    for m in 2..6 {
        let bound = analysis::work_conserving_bound(&task, m).unwrap();
        assert!(bound <= analysis::classic_bound(&task, m).unwrap());
        assert!(bound >= task.critical_path().length());
    }
}

#[test]
fn tied_consumer_nodes_take_the_costliest_chain() {
    // nodes 3, 4 and 5 all finish at 4 after the provider [1, 2] ends
    // at 3; node 3 costs nothing and delays nothing
    let task = DagTask::new(
        vec![0, 3, 0, 1, 3, 1],
        [(1, 2), (1, 3), (1, 4), (1, 5), (2, 6), (3, 6), (4, 6), (5, 6)],
    )
    .unwrap();
    assert_eq!(task.critical_path().nodes(), &nodes(&[1, 2, 6])[..]);
    let eo = EligibilityOrdering.assign(&task).unwrap();
    let bound = analysis::alpha_beta_bound(&task, 2, Some(&eo)).unwrap();

    let p = &bound.providers[0];
    assert_eq!(p.finish_time, 3);
    for v in [3, 4, 5] {
        assert_eq!(bound.finish_time(NodeId::new(v)), Some(4));
    }
    assert_eq!(p.case, Case::Delayed);
    assert_eq!(p.beta, 1);
    // 4 and 5 both overrun by one; 4 also suffers interference
    assert_eq!(p.delay_chain, nodes(&[4]));
    assert_eq!(p.response_time, 5);
    assert_eq!(bound.response_time, 6);

    let worst = worst_makespan(&task, 2, DispatchPolicy::StaticPriority(&eo), 200);
    assert!(worst <= bound.response_time, "observed makespan {}", worst);
    assert_eq!(analysis::work_conserving_bound(&task, 2), Ok(5));
}

#[test]
fn bounds_below_the_work_conserving_bound_are_rejected() {
    // node 6 cannot start before node 2, which may wait for the long
    // node 5, so the sink finishes later than the provider bounds admit
    let task = DagTask::new(
        vec![1, 1, 5, 2, 9, 4, 1],
        [
            (1, 2),
            (1, 3),
            (1, 4),
            (1, 5),
            (2, 6),
            (3, 6),
            (4, 7),
            (5, 7),
            (6, 7),
        ],
    )
    .unwrap();
    let eo = EligibilityOrdering.assign(&task).unwrap();
    assert_eq!(
        analysis::alpha_beta_bound(&task, 2, Some(&eo)),
        Err(AnalysisError::UnsafeBound {
            bound: 12,
            safe: 17
        })
    );
    let worst = worst_makespan(&task, 2, DispatchPolicy::StaticPriority(&eo), 50);
    assert!(worst > 12 && worst <= 17, "observed makespan {}", worst);

    // without priorities, the credit assumes the critical node 4 never
    // waits, but a dispatcher may run 2 and 3 first
    let task = DagTask::new(
        vec![0, 1, 1, 2, 1],
        [(1, 2), (1, 3), (1, 4), (2, 5), (3, 5), (4, 5)],
    )
    .unwrap();
    assert_eq!(
        analysis::alpha_beta_bound(&task, 2, None),
        Err(AnalysisError::UnsafeBound { bound: 3, safe: 4 })
    );
    assert!(worst_makespan(&task, 2, DispatchPolicy::Random, 200) <= 4);
}

proptest! {
    #[test]
    fn classic_bound_lies_between_length_and_volume(task in dag_tasks(10), m in 1usize..8) {
        let bound = analysis::classic_bound(&task, m).unwrap();
        prop_assert!(bound >= task.critical_path().length());
        prop_assert!(bound <= task.volume());
    }

    #[test]
    fn single_core_bound_is_the_volume(task in dag_tasks(10)) {
        let bound = analysis::alpha_beta_bound(&task, 1, None).unwrap();
        prop_assert_eq!(bound.response_time, task.volume());
    }

    #[test]
    fn work_conserving_bound_covers_every_policy(task in dag_tasks(8), m in 2usize..5) {
        let bound = analysis::work_conserving_bound(&task, m).unwrap();
        prop_assert!(bound <= analysis::classic_bound(&task, m).unwrap());
        let eo = EligibilityOrdering.assign(&task).unwrap();
        for policy in [
            DispatchPolicy::Random,
            DispatchPolicy::StaticPriority(&eo),
            DispatchPolicy::DynamicGreedy,
        ] {
            let worst = worst_makespan(&task, m, policy, 8);
            prop_assert!(worst <= bound, "makespan {} above bound {}", worst, bound);
        }
    }

    #[test]
    fn bounds_cover_simulated_makespans(task in dag_tasks(8), m in 2usize..5) {
        let eo = EligibilityOrdering.assign(&task).unwrap();
        let tpds = TpdsOrdering.assign(&task).unwrap();
        let policies = [
            DispatchPolicy::Random,
            DispatchPolicy::StaticPriority(&eo),
            DispatchPolicy::StaticPriority(&tpds),
            DispatchPolicy::DynamicGreedy,
        ];
        for priorities in [None, Some(&eo), Some(&tpds)] {
            match analysis::alpha_beta_bound(&task, m, priorities) {
                Ok(bound) => {
                    prop_assert!(bound.response_time >= task.critical_path().length());
                    for v in task.nodes() {
                        prop_assert!(bound.finish_time(v).is_some());
                    }
                    for policy in policies {
                        let worst = worst_makespan(&task, m, policy, 8);
                        prop_assert!(
                            worst <= bound.response_time,
                            "makespan {} above bound {}", worst, bound.response_time
                        );
                    }
                }
                Err(AnalysisError::CreditCeilingExceeded { alpha, ceiling, .. }) => {
                    prop_assert!(priorities.is_none());
                    prop_assert!(alpha > ceiling);
                }
                Err(AnalysisError::UnsafeBound { bound, safe }) => {
                    prop_assert!(bound < safe);
                    prop_assert_eq!(Ok(safe), analysis::work_conserving_bound(&task, m));
                }
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }
        }
    }
}
