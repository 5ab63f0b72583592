/*! Response-time analysis and simulation of DAG tasks

This crate bounds the worst-case response time of a single DAG task
executing non-preemptively on `m` identical cores, and simulates
concrete schedules of the same task to check those bounds empirically.

- [dag] defines the task model and its critical path.
- [graph] provides the structural queries the algorithms build on,
  on top of `petgraph`.
- [decomposition] splits the critical path into providers and their
  consumers.
- [priority] assigns static priorities to the non-critical nodes.
- [analysis] computes the classic bound, a node-level bound for any
  work-conserving dispatcher, and the provider-based response-time
  bound.
- [simulation] enacts a single schedule and reports its makespan.
*/

pub mod analysis;
pub mod dag;
pub mod decomposition;
pub mod graph;
pub mod priority;
pub mod simulation;
pub mod time;

pub use dag::{DagTask, NodeId};
