use std::collections::BTreeMap;
use std::iter;

use tracing::{debug, trace};

use super::{work_conserving_bound, AnalysisError, AnalysisResult};
use crate::dag::{DagTask, NodeId};
use crate::decomposition::{self, Decomposition};
use crate::graph::{self, NodeSet};
use crate::priority::{Priority, PriorityMap};
use crate::time::{divide_with_ceil, Duration, Instant, Service};

/// How a provider relates to its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    /// Every consumer node finishes no later than the provider.
    NoDelay,
    /// Some consumer node may finish after the provider and hold back
    /// the next provider.
    Delayed,
}

/// The analysis result for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderBound {
    /// `L_i`, the provider's own cost.
    pub length: Service,
    /// `W_i`, the provider's cost plus its consumer's cost.
    pub workload: Service,
    /// Finish time of the provider's last node.
    pub finish_time: Instant,
    pub case: Case,
    /// Consumer work credited as running in parallel with the provider.
    pub alpha: Service,
    /// Consumer work delaying the next provider.
    pub beta: Service,
    /// The consumer nodes responsible for `beta`, latest first.
    pub delay_chain: Vec<NodeId>,
    /// `R_i`
    pub response_time: Duration,
}

/// The outcome of [alpha_beta_bound].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTimeBound {
    /// `R`, the sum of all provider bounds.
    pub response_time: Duration,
    /// One entry per provider, in critical-path order.
    pub providers: Vec<ProviderBound>,
    finish_times: Vec<Option<Instant>>,
}

impl ResponseTimeBound {
    /// The finish time bound derived for `node`. Not available for
    /// single-core analyses, which need none.
    pub fn finish_time(&self, node: NodeId) -> Option<Instant> {
        self.finish_times.get(node.index()).copied().flatten()
    }

    pub fn alphas(&self) -> Vec<Service> {
        self.providers.iter().map(|p| p.alpha).collect()
    }

    pub fn betas(&self) -> Vec<Service> {
        self.providers.iter().map(|p| p.beta).collect()
    }
}

/// Bound the response time of `dag` on `cores` cores by summing one
/// bound per provider of its decomposition.
///
/// For each consumer node `v`, the finish time is bounded by
/// `f(v) = C(v) + max f(pred) + I(v)`, where `I(v)` is zero if the
/// non-critical nodes concurrent to `v` never need more than `m - 1`
/// cores, and otherwise their cost (minus what was charged to the
/// ancestors of `v`, and limited by `priorities` if given) spread over
/// `m - 1` cores. Each provider is then classified by comparing its own
/// finish time to the latest finish time of its consumer.
///
/// The credit `alpha_i` must not exceed `(m - 1) * L_i`. If it does,
/// the function returns [AnalysisError::CreditCeilingExceeded] instead
/// of a bound; this check applies where `alpha_i` enters the bound,
/// i.e., when no priority map is given.
///
/// Finally, `R` is checked against [work_conserving_bound], which every
/// work-conserving dispatcher is guaranteed to meet. A smaller `R` means
/// the per-provider assumptions did not hold for this task, and
/// [AnalysisError::UnsafeBound] is returned instead.
#[allow(non_snake_case)]
pub fn alpha_beta_bound(
    dag: &DagTask,
    cores: usize,
    priorities: Option<&PriorityMap>,
) -> AnalysisResult {
    if cores == 0 {
        return Err(AnalysisError::NoCores);
    }
    let decomposition = decomposition::find_providers_consumers(dag);
    if cores == 1 {
        return Ok(serialized(dag, &decomposition));
    }

    let mut analysis = Analysis {
        dag,
        cores,
        priorities,
        finish: vec![None; dag.node_count()],
        interference: vec![None; dag.node_count()],
    };

    // The first pass settles every finish time; the second re-derives
    // them in the same order and bounds each provider along the way.
    let mut providers = Vec::with_capacity(decomposition.len());
    for pass in 0..2 {
        for (i, (provider, consumer)) in decomposition.iter().enumerate() {
            let f_star = analysis.provider_pass(provider)?;
            analysis.consumer_pass(consumer)?;
            if pass == 1 {
                providers.push(analysis.bound_provider(i, provider, consumer, f_star)?);
            }
        }
    }

    let R: Duration = providers.iter().map(|p| p.response_time).sum();
    let safe = work_conserving_bound(dag, cores)?;
    if R < safe {
        debug!(cores, response_time = R, safe, "alpha/beta bound rejected");
        return Err(AnalysisError::UnsafeBound { bound: R, safe });
    }
    debug!(cores, response_time = R, "alpha/beta bound");
    Ok(ResponseTimeBound {
        response_time: R,
        providers,
        finish_times: analysis.finish,
    })
}

/// On a single core everything runs sequentially: `R_i = W_i`.
fn serialized(dag: &DagTask, decomposition: &Decomposition) -> ResponseTimeBound {
    let mut elapsed = 0;
    let providers: Vec<ProviderBound> = (0..decomposition.len())
        .map(|i| {
            let length = decomposition.provider_cost(dag, i);
            let workload = length + decomposition.consumer_cost(dag, i);
            let finish_time = elapsed + length;
            elapsed += workload;
            ProviderBound {
                length,
                workload,
                finish_time,
                case: Case::NoDelay,
                alpha: 0,
                beta: 0,
                delay_chain: Vec::new(),
                response_time: workload,
            }
        })
        .collect();
    ResponseTimeBound {
        response_time: providers.iter().map(|p| p.response_time).sum(),
        providers,
        finish_times: vec![None; dag.node_count()],
    }
}

struct Analysis<'a> {
    dag: &'a DagTask,
    cores: usize,
    priorities: Option<&'a PriorityMap>,
    finish: Vec<Option<Instant>>,
    // per consumer node, the nodes charged as its interference
    interference: Vec<Option<NodeSet>>,
}

impl Analysis<'_> {
    fn finish_time(&self, node: NodeId) -> Result<Instant, AnalysisError> {
        self.finish[node.index()].ok_or(AnalysisError::MissingFinishTime { node })
    }

    fn priority(prios: &PriorityMap, node: NodeId) -> Result<Priority, AnalysisError> {
        prios
            .get(node)
            .ok_or(AnalysisError::MissingPriority { node })
    }

    /// The latest finish time among the predecessors of `node`.
    fn release_time(&self, node: NodeId) -> Result<Instant, AnalysisError> {
        let mut latest = 0;
        for pred in self.dag.predecessors(node) {
            latest = latest.max(self.finish_time(pred)?);
        }
        Ok(latest)
    }

    /// Provider nodes run without interference. Returns the finish time
    /// of the provider's last node.
    fn provider_pass(&mut self, provider: &[NodeId]) -> Result<Instant, AnalysisError> {
        let mut last = 0;
        for node in provider {
            last = self.dag.cost(*node) + self.release_time(*node)?;
            self.finish[node.index()] = Some(last);
        }
        Ok(last)
    }

    fn consumer_pass(&mut self, consumer: &[NodeId]) -> Result<(), AnalysisError> {
        for node in consumer {
            let interference = self.interference(*node)?;
            let finish = self.dag.cost(*node) + self.release_time(*node)? + interference;
            trace!(node = %node, finish, interference, "consumer finish time");
            self.finish[node.index()] = Some(finish);
        }
        Ok(())
    }

    /// Determine and record the interference set of `node`; returns the
    /// resulting delay.
    fn interference(&mut self, node: NodeId) -> Result<Service, AnalysisError> {
        let spare = self.cores - 1;
        let critical = self.dag.critical_path().members();

        let mut candidates = graph::concurrent_nodes(self.dag, node);
        candidates.difference_with(critical);
        if graph::test_parallelism(self.dag, &candidates, spare) {
            self.interference[node.index()] = Some(NodeSet::empty(self.dag.node_count()));
            return Ok(0);
        }

        for ancestor in graph::ancestors(self.dag, node).iter() {
            if critical.contains(ancestor) {
                continue;
            }
            let charged = self.interference[ancestor.index()]
                .as_ref()
                .ok_or(AnalysisError::MissingInterferenceSet { node: ancestor })?;
            candidates.difference_with(charged);
        }

        if let Some(prios) = self.priorities {
            let dag = self.dag;
            candidates = self.most_relevant(prios, node, &candidates, |v| dag.cost(v))?;
        }

        let charged = self.dag.cost_of(candidates.iter());
        self.interference[node.index()] = Some(candidates);
        Ok(divide_with_ceil(charged, spare as Service))
    }

    /// Keep every candidate of higher priority than `node`, and the
    /// `m - 1` heaviest others (by `weight`, the smaller id first among
    /// equals).
    fn most_relevant<F>(
        &self,
        prios: &PriorityMap,
        node: NodeId,
        candidates: &NodeSet,
        weight: F,
    ) -> Result<NodeSet, AnalysisError>
    where
        F: Fn(NodeId) -> Service,
    {
        let own = Self::priority(prios, node)?;
        let mut kept = NodeSet::empty(self.dag.node_count());
        let mut lower = Vec::new();
        for v in candidates.iter() {
            if Self::priority(prios, v)? > own {
                kept.insert(v);
            } else {
                lower.push(v);
            }
        }
        lower.sort_by(|a, b| weight(*b).cmp(&weight(*a)));
        kept.extend(lower.into_iter().take(self.cores - 1));
        Ok(kept)
    }

    /// The part of `node`'s execution that may fall after `f_star`.
    fn overrun(&self, node: NodeId, f_star: Instant) -> Result<Service, AnalysisError> {
        let finish = self.finish_time(node)?;
        let cost = self.dag.cost(node);
        Ok(if finish - cost >= f_star {
            cost
        } else {
            finish.saturating_sub(f_star)
        })
    }

    /// The delay chain behind every consumer node finishing after
    /// `f_star`, together with the overrun it accumulates.
    ///
    /// A chain walks back through the consumer predecessors that finish
    /// after `f_star`, always taking the latest one. Among equally late
    /// predecessors it follows the one with the larger overrun behind
    /// it (the smaller id among equals).
    fn delay_chains(
        &self,
        consumer: &[NodeId],
        f_star: Instant,
    ) -> Result<BTreeMap<NodeId, (Service, Vec<NodeId>)>, AnalysisError> {
        let members = NodeSet::from_nodes(self.dag.node_count(), consumer.iter().copied());
        let mut chains: BTreeMap<NodeId, (Service, Vec<NodeId>)> = BTreeMap::new();
        // consumers are in topological order
        for node in consumer.iter().copied() {
            if self.finish_time(node)? <= f_star {
                continue;
            }
            let mut preds = Vec::new();
            for pred in graph::predecessors_within(self.dag, node, &members) {
                preds.push((pred, self.finish_time(pred)?));
            }
            let latest = preds.iter().map(|(_, f)| *f).max().unwrap_or(0);
            let mut behind: Option<&(Service, Vec<NodeId>)> = None;
            if latest > f_star {
                for (pred, finish) in &preds {
                    if *finish != latest {
                        continue;
                    }
                    if let Some(candidate) = chains.get(pred) {
                        if behind.map_or(true, |(overrun, _)| candidate.0 > *overrun) {
                            behind = Some(candidate);
                        }
                    }
                }
            }
            let own = self.overrun(node, f_star)?;
            let entry = match behind {
                Some((overrun, chain)) => (
                    own + overrun,
                    iter::once(node).chain(chain.iter().copied()).collect(),
                ),
                None => (own, vec![node]),
            };
            chains.insert(node, entry);
        }
        Ok(chains)
    }

    /// Consumer work that completes while the provider runs: nodes
    /// finishing by `f_star` in full, nodes finishing less than their
    /// cost after `f_star` in part.
    fn credit(&self, consumer: &[NodeId], f_star: Instant) -> Result<Service, AnalysisError> {
        let mut alpha = 0;
        for node in consumer {
            let finish = self.finish_time(*node)?;
            let cost = self.dag.cost(*node);
            if finish <= f_star {
                alpha += cost;
            } else if finish < f_star + cost {
                alpha += f_star - (finish - cost);
            }
        }
        Ok(alpha)
    }

    /// The delay the interference of the delay chain adds under a
    /// priority order.
    fn chain_interference(
        &self,
        prios: &PriorityMap,
        chain: &[NodeId],
        f_star: Instant,
    ) -> Result<Service, AnalysisError> {
        let mut interfering = NodeSet::empty(self.dag.node_count());
        for node in chain {
            let mut late = self.interference[node.index()]
                .clone()
                .ok_or(AnalysisError::MissingInterferenceSet { node: *node })?;
            for v in late.clone().iter() {
                if self.finish_time(v)? <= f_star {
                    late.remove(v);
                }
            }
            let mut contribution = Vec::with_capacity(self.dag.node_count());
            for v in self.dag.nodes() {
                contribution.push(if late.contains(v) {
                    self.overrun(v, f_star)?
                } else {
                    0
                });
            }
            interfering.union_with(&self.most_relevant(prios, *node, &late, |v| {
                contribution[v.index()]
            })?);
        }

        if graph::test_parallelism(self.dag, &interfering, self.cores) {
            return Ok(0);
        }
        let mut total = 0;
        for v in interfering.iter() {
            total += self.overrun(v, f_star)?;
        }
        Ok(divide_with_ceil(total, self.cores as Service))
    }

    #[allow(non_snake_case)]
    fn bound_provider(
        &self,
        index: usize,
        provider: &[NodeId],
        consumer: &[NodeId],
        f_star: Instant,
    ) -> Result<ProviderBound, AnalysisError> {
        let L_i = self.dag.cost_of(provider.iter().copied());
        let consumer_work = self.dag.cost_of(consumer.iter().copied());

        let mut latest: Option<Instant> = None;
        for node in consumer {
            latest = latest.max(Some(self.finish_time(*node)?));
        }

        let m = self.cores as Service;
        let (case, alpha, beta, delay_chain, chain_delay) = match latest {
            Some(last) if last > f_star => {
                // of the chains behind the latest finishing nodes, the one
                // delaying the next provider most
                let chains = self.delay_chains(consumer, f_star)?;
                let mut selected: Option<(Service, Service, &Vec<NodeId>)> = None;
                for node in consumer {
                    if self.finish_time(*node)? != last {
                        continue;
                    }
                    let (beta, chain) = match chains.get(node) {
                        Some(entry) => entry,
                        None => continue,
                    };
                    let delay = match self.priorities {
                        Some(prios) if *beta > 0 => self.chain_interference(prios, chain, f_star)?,
                        _ => 0,
                    };
                    if selected.map_or(true, |(b, d, _)| (*beta, delay) > (b, d)) {
                        selected = Some((*beta, delay, chain));
                    }
                }
                let (beta, delay, chain) = match selected {
                    Some((beta, delay, chain)) => (beta, delay, chain.clone()),
                    None => (0, 0, Vec::new()),
                };
                (Case::Delayed, self.credit(consumer, f_star)?, beta, chain, delay)
            }
            _ => (Case::NoDelay, consumer_work, 0, Vec::new(), 0),
        };

        let response_time = match self.priorities {
            None => {
                let ceiling = (m - 1) * L_i;
                if alpha > ceiling {
                    return Err(AnalysisError::CreditCeilingExceeded {
                        provider: index,
                        alpha,
                        ceiling,
                    });
                }
                let residual = consumer_work.checked_sub(alpha + beta).ok_or(
                    AnalysisError::CreditExceedsWorkload {
                        provider: index,
                        alpha,
                        beta,
                        work: consumer_work,
                    },
                )?;
                L_i + beta + divide_with_ceil(residual, m)
            }
            Some(_) if beta == 0 => L_i,
            Some(_) => L_i + beta + chain_delay,
        };

        debug!(
            provider = index,
            length = L_i,
            finish = f_star,
            ?case,
            alpha,
            beta,
            response_time,
            "provider bound"
        );
        Ok(ProviderBound {
            length: L_i,
            workload: L_i + consumer_work,
            finish_time: f_star,
            case,
            alpha,
            beta,
            delay_chain,
            response_time,
        })
    }
}
