/*! Discrete-event simulation of one DAG task execution

[simulate] runs the task non-preemptively on `m` identical cores. Each
node moves from waiting to ready once all its predecessors have
finished, is dispatched to an idle core according to a
[DispatchPolicy], runs for a duration drawn from an [ExecutionModel],
and then finishes. Time jumps directly from one completion to the next.

A run is fully determined by the task, the configuration, and the
seed. Events are reported through `tracing`: dispatches and completions
at `debug` level with the simulated `time`, an exhausted time budget at
`warn` level.
*/

use rand::rngs::SmallRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::dag::{DagTask, NodeId};
use crate::time::{Duration, Instant, Service};

mod policy;

pub use policy::{DispatchPolicy, ExecutionModel};

/// The time budget of a run unless configured otherwise.
pub const DEFAULT_TIME_BUDGET: Duration = 100_000;

/// Errors ending a simulation run without a makespan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("at least one core is required")]
    NoCores,

    #[error("time budget {budget} exceeded with {finished} of {total} nodes finished")]
    BudgetExceeded {
        budget: Duration,
        finished: usize,
        total: usize,
    },

    #[error("{node} has no priority level")]
    MissingPriority { node: NodeId },

    #[error("no node can make progress at time {time}")]
    Stalled { time: Instant },
}

/// The parameters of one simulation run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig<'a> {
    /// The number of identical cores.
    pub cores: usize,
    pub policy: DispatchPolicy<'a>,
    pub execution: ExecutionModel,
    /// Seed of the run's random number generator.
    pub seed: u64,
    /// The run fails if it has not finished by this time.
    pub time_budget: Duration,
}

impl<'a> SimulationConfig<'a> {
    /// Exact execution times, seed 0, and the default time budget.
    pub fn new(cores: usize, policy: DispatchPolicy<'a>) -> Self {
        SimulationConfig {
            cores,
            policy,
            execution: ExecutionModel::Exact,
            seed: 0,
            time_budget: DEFAULT_TIME_BUDGET,
        }
    }

    pub fn with_execution(mut self, execution: ExecutionModel) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = time_budget;
        self
    }
}

/// When and where one node ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRecord {
    pub node: NodeId,
    pub core: usize,
    pub start: Instant,
    pub finish: Instant,
}

/// The outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Completion time of the last node.
    pub makespan: Duration,
    /// One record per node, in dispatch order.
    pub records: Vec<DispatchRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Waiting,
    Ready,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Core {
    Idle,
    Busy { node: NodeId, remaining: Service },
}

/// Simulate one execution of `dag` under `config`.
pub fn simulate(dag: &DagTask, config: &SimulationConfig) -> Result<Schedule, SimulationError> {
    if config.cores == 0 {
        return Err(SimulationError::NoCores);
    }
    let total = dag.node_count();
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut state = vec![NodeState::Waiting; total];
    let mut cores = vec![Core::Idle; config.cores];
    let mut ready: Vec<NodeId> = Vec::new();
    let mut records = Vec::with_capacity(total);
    let mut finished = 0;
    let mut now: Instant = 0;

    loop {
        for node in dag.nodes() {
            if state[node.index()] == NodeState::Waiting
                && dag
                    .predecessors(node)
                    .all(|u| state[u.index()] == NodeState::Finished)
            {
                state[node.index()] = NodeState::Ready;
                ready.push(node);
            }
        }
        ready.sort_unstable();
        trace!(time = now, ready = ready.len(), "scheduling point");

        for (index, core) in cores.iter_mut().enumerate() {
            if ready.is_empty() {
                break;
            }
            if *core != Core::Idle {
                continue;
            }
            let pick = config.policy.select(dag, &ready, &mut rng)?;
            let node = ready.remove(pick);
            let duration = config.execution.realize(dag.cost(node), &mut rng);
            debug!(time = now, core = index, node = %node, duration, "dispatch");
            state[node.index()] = NodeState::Running;
            records.push(DispatchRecord {
                node,
                core: index,
                start: now,
                finish: now + duration,
            });
            *core = Core::Busy {
                node,
                remaining: duration,
            };
        }

        let step = cores
            .iter()
            .filter_map(|core| match core {
                Core::Busy { remaining, .. } => Some(*remaining),
                Core::Idle => None,
            })
            .min();
        let step = match step {
            Some(step) => step,
            None => return Err(SimulationError::Stalled { time: now }),
        };
        if now + step > config.time_budget {
            warn!(
                time = now,
                budget = config.time_budget,
                finished,
                total,
                "simulation exceeded its time budget"
            );
            return Err(SimulationError::BudgetExceeded {
                budget: config.time_budget,
                finished,
                total,
            });
        }
        now += step;

        for (index, core) in cores.iter_mut().enumerate() {
            let completed = match core {
                Core::Busy { node, remaining } => {
                    *remaining -= step;
                    (*remaining == 0).then_some(*node)
                }
                Core::Idle => None,
            };
            if let Some(node) = completed {
                debug!(time = now, core = index, node = %node, "complete");
                state[node.index()] = NodeState::Finished;
                finished += 1;
                *core = Core::Idle;
            }
        }

        if finished == total {
            debug!(makespan = now, "simulation finished");
            return Ok(Schedule {
                makespan: now,
                records,
            });
        }
    }
}
