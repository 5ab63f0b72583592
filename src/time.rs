//! The discrete time model shared by the analysis and the simulator.

/// All costs, finish times, and makespans are measured in integral
/// time units.
pub type Time = u64;

/// A point on the timeline of one execution of the DAG task, measured
/// from the release of its source node.
pub type Instant = Time;

/// The length of an interval, such as a response-time bound or a
/// makespan.
pub type Duration = Time;

/// An amount of processor service, such as a node's worst-case
/// execution cost or the total work of a set of nodes.
pub type Service = Time;

/// Integer division rounding towards positive infinity.
///
/// Panics if `b` is zero, like ordinary integer division.
pub fn divide_with_ceil(a: Service, b: Service) -> Service {
    a / b + (a % b > 0) as Service
}
