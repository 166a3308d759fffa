//! Per-commit and cumulative statistics (§4.7).
//!
//! All counters here are derived; none of them feed back into the solver or the
//! committer. They exist purely for the `STATS:` line and the final JSON report.

use std::collections::{BTreeSet, HashMap};

use crate::demand::DemandSet;
use crate::ident::{InputId, PortId, SpineId};
use crate::locks::LockStore;
use crate::state::{CommittedState, CumulativeCounters, DesiredState, PreviousState};

/// Everything derived from a single successful repack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitMetrics {
    /// Ports with a non-zero owner after this commit.
    pub routes_active: u32,
    /// Ports whose spine is unchanged from before this commit.
    pub routes_preserved: u32,
    /// Ports connected for the first time (no prior recorded spine).
    pub routes_new: u32,
    /// Ports that were connected before this commit and are not anymore.
    pub routes_removed: u32,
    /// This commit's stability cost (demand-level reroutes).
    pub stability_changes: u32,
    /// Port-level spine churn this commit (any port whose effective spine changed).
    pub reroutes_outputs_delta: u32,
    /// Demands covered by a live lock.
    pub locked_demands: u32,
    /// Output ports covered by a live lock on their demand.
    pub locked_outputs: u32,
    /// Inputs delivering to 2 or more output ports.
    pub inputs_with_mult: u32,
    /// Inputs whose connected ports span 2 or more distinct spines.
    pub inputs_multi_spine: u32,
    /// Egress blocks serving 2 or more distinct inputs.
    pub egress_with_mult: u32,
    /// The single highest distinct-input count across all egress blocks.
    pub max_egress_load: u32,
    /// Spines carrying at least one trunk.
    pub active_spines: u32,
    /// Sum of distinct spines used per input.
    pub total_branches: u32,
}

impl CommitMetrics {
    /// `(initial_route_count - cumulative demand-level reroutes) / initial_route_count`.
    #[must_use]
    pub fn stability_reuse_pct(counters: &CumulativeCounters) -> f64 {
        if counters.initial_route_count == 0 {
            return 1.0;
        }
        let preserved = counters
            .initial_route_count
            .saturating_sub(counters.reroutes_demands);
        preserved as f64 / counters.initial_route_count as f64
    }
}

/// Computes this commit's metrics by comparing `new_committed` against the state
/// immediately before this repack (`old_committed`, falling back to the
/// process-startup `previous` snapshot for ports that were never committed
/// in-process yet).
#[must_use]
pub fn compute_commit_metrics(
    new_committed: &CommittedState,
    old_committed: &CommittedState,
    previous: &PreviousState,
    desired: &DesiredState,
    locks: &LockStore,
    demands: &DemandSet,
    n: u32,
) -> CommitMetrics {
    let prior_spine = |port: PortId| -> Option<SpineId> {
        old_committed
            .port_spine(port)
            .or_else(|| previous.spine_of(port))
    };

    let mut ports: BTreeSet<PortId> = BTreeSet::new();
    for (port, _) in desired.iter() {
        ports.insert(*port);
    }
    for (port, _) in old_committed.iter_port_spines() {
        ports.insert(*port);
    }
    for (port, _) in previous.iter_port_spines() {
        ports.insert(*port);
    }

    let mut routes_active = 0u32;
    let mut routes_preserved = 0u32;
    let mut routes_new = 0u32;
    let mut routes_removed = 0u32;
    let mut reroutes_outputs_delta = 0u32;

    for port in &ports {
        let cur_spine = new_committed.port_spine(*port);
        let was_spine = prior_spine(*port);
        if new_committed.port_owner(*port).is_some() {
            routes_active += 1;
            match was_spine {
                Some(s) if Some(s) == cur_spine => routes_preserved += 1,
                None => routes_new += 1,
                Some(_) => {} // reroute: active both before and after, different spine
            }
        } else if was_spine.is_some() {
            routes_removed += 1;
        }
        if was_spine != cur_spine {
            reroutes_outputs_delta += 1;
        }
    }

    let mut outputs_per_input: HashMap<InputId, Vec<PortId>> = HashMap::new();
    for (port, input) in desired.iter() {
        outputs_per_input.entry(*input).or_default().push(*port);
    }
    let inputs_with_mult = outputs_per_input.values().filter(|v| v.len() >= 2).count() as u32;

    let mut spines_per_input: HashMap<InputId, BTreeSet<SpineId>> = HashMap::new();
    for (port, spine) in new_committed.iter_port_spines() {
        if let Some(owner) = new_committed.port_owner(*port) {
            spines_per_input.entry(owner).or_default().insert(*spine);
        }
    }
    let inputs_multi_spine = spines_per_input.values().filter(|s| s.len() >= 2).count() as u32;
    let total_branches: u32 = spines_per_input.values().map(|s| s.len() as u32).sum();

    let mut inputs_per_egress: HashMap<crate::ident::BlockId, BTreeSet<InputId>> = HashMap::new();
    for d in &demands.demands {
        inputs_per_egress
            .entry(d.egress_block)
            .or_default()
            .insert(d.input);
    }
    let egress_with_mult = inputs_per_egress.values().filter(|s| s.len() >= 2).count() as u32;
    let max_egress_load = inputs_per_egress
        .values()
        .map(|s| s.len() as u32)
        .max()
        .unwrap_or(0);

    let active_spines = (0..n as usize)
        .filter(|&s| {
            (0..n as usize).any(|b| new_committed.stage1_owner(crate::ident::BlockId(b), SpineId(s)).is_some())
                || (0..n as usize)
                    .any(|b| new_committed.stage2_owner(SpineId(s), crate::ident::BlockId(b)).is_some())
        })
        .count() as u32;

    let locked_demands = demands
        .demands
        .iter()
        .filter(|d| locks.spine_for(d.input, d.egress_block).is_some())
        .count() as u32;
    let locked_outputs = desired
        .iter()
        .filter(|&(port, input)| locks.spine_for(*input, port.block(n)).is_some())
        .count() as u32;

    CommitMetrics {
        routes_active,
        routes_preserved,
        routes_new,
        routes_removed,
        stability_changes: 0, // filled in by the caller from the solver's cost
        reroutes_outputs_delta,
        locked_demands,
        locked_outputs,
        inputs_with_mult,
        inputs_multi_spine,
        egress_with_mult,
        max_egress_load,
        active_spines,
        total_branches,
    }
}
