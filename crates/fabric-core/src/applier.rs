//! Transactional command applier (§4.6): stages a desired-state edit, invokes a
//! full repack, and rolls back the edit if the repack fails.
//!
//! [`FabricContext`] owns every piece of mutable state for one process
//! invocation — desired state, committed state, the startup previous-state
//! snapshot, locks, and cumulative counters — matching the single-owner
//! resource model in §5.

use std::time::Instant;

use crate::capacity::check_capacity;
use crate::commit::commit;
use crate::demand::{build_demands, Demand, DemandSet};
use crate::error::{ApplyError, RepackError, RequestError};
use crate::ident::{BlockId, InputId, PortId, SpineId};
use crate::locks::{validate_live_locks, LockStore};
use crate::metrics::{compute_commit_metrics, CommitMetrics};
use crate::solver::{solve, Progress, Solved};
use crate::state::{CommittedState, CumulativeCounters, DesiredState, PreviousState};

/// Everything produced by one successful repack.
#[derive(Debug, Clone, Copy)]
pub struct RepackReport {
    /// This repack's per-commit metrics.
    pub metrics: CommitMetrics,
    /// Solver wall-clock time for this repack, in milliseconds.
    pub solve_ms: f64,
}

/// All mutable fabric state for one process invocation.
pub struct FabricContext {
    /// Radix this context was built for.
    pub n: u32,
    /// Whether a nonzero stability cost should fail the commit instead of
    /// being accepted.
    pub strict_stability: bool,
    /// Current authoritative end-state.
    pub desired: DesiredState,
    /// Currently committed assignment.
    pub committed: CommittedState,
    /// Startup snapshot of the prior process's port-spine mapping.
    pub previous: PreviousState,
    /// Validated locks, loaded once at startup.
    pub locks: LockStore,
    /// Counters carried across commands within this invocation.
    pub counters: CumulativeCounters,
}

impl FabricContext {
    /// Builds an empty context: no routes, no commits yet.
    #[must_use]
    pub fn new(n: u32, strict_stability: bool, previous: PreviousState, locks: LockStore) -> Self {
        Self {
            n,
            strict_stability,
            desired: DesiredState::default(),
            committed: CommittedState::empty(n),
            previous,
            locks,
            counters: CumulativeCounters::default(),
        }
    }

    /// Assigns `outputs` to `input`. Rejects the whole request if `input` itself
    /// is out of range, if any output is out of range, or if any output is
    /// already owned by a different input. On repack failure, every staged port
    /// is restored to its prior owner and the pre-edit state is re-repacked.
    pub fn apply_route(
        &mut self,
        input: InputId,
        outputs: &[PortId],
        on_progress: impl FnMut(Progress),
    ) -> Result<RepackReport, ApplyError> {
        let max_port = self.n * self.n;
        if input.get() > max_port {
            return Err(RequestError::InputOutOfRange {
                input: input.get(),
                max: max_port,
            }
            .into());
        }
        if outputs.is_empty() {
            return Err(RequestError::EmptyTargetList(input.get()).into());
        }
        for &port in outputs {
            if port.get() > max_port {
                return Err(RequestError::PortOutOfRange {
                    port: port.get(),
                    max: max_port,
                }
                .into());
            }
            if let Some(owner) = self.desired.owner_of(port) {
                if owner != input {
                    return Err(RequestError::PortAlreadyOwned {
                        port: port.get(),
                        owner: owner.get(),
                    }
                    .into());
                }
            }
        }

        let staged: Vec<(PortId, Option<InputId>)> = outputs
            .iter()
            .map(|&port| (port, self.desired.owner_of(port)))
            .collect();
        for &port in outputs {
            self.desired.set(port, input);
        }

        self.repack_or_rollback(on_progress, move |desired| {
            for (port, prior) in &staged {
                match prior {
                    Some(owner) => desired.set(*port, *owner),
                    None => {
                        desired.unset(*port);
                    }
                }
            }
        })
    }

    /// Disconnects every output port currently owned by `input`. A no-op if
    /// `input` owns nothing.
    pub fn apply_clear(
        &mut self,
        input: InputId,
        on_progress: impl FnMut(Progress),
    ) -> Result<RepackReport, ApplyError> {
        let freed = self.desired.clear_input(input);
        self.repack_or_rollback(on_progress, move |desired| {
            for &port in &freed {
                desired.set(port, input);
            }
        })
    }

    /// Runs a repack; on recoverable failure, applies `undo` to restore the
    /// pre-edit desired state and re-repacks (which must succeed, since that
    /// state was satisfiable immediately before this call).
    fn repack_or_rollback(
        &mut self,
        mut on_progress: impl FnMut(Progress),
        undo: impl FnOnce(&mut DesiredState),
    ) -> Result<RepackReport, ApplyError> {
        match self.repack(&mut on_progress) {
            Ok(report) => Ok(report),
            Err(RepackOutcome::Fatal(violation)) => Err(ApplyError::Fatal(violation)),
            Err(RepackOutcome::Recoverable(err)) => {
                undo(&mut self.desired);
                if self.repack(&mut |_| {}).is_err() {
                    unreachable!(
                        "pre-edit desired state was satisfiable; rollback repack cannot fail"
                    );
                }
                Err(ApplyError::Repack(err))
            }
        }
    }

    /// Rebuilds demands from the current desired state, checks capacity and
    /// locks, searches for an assignment, and commits it. On success, mutates
    /// `self.committed` and `self.counters` in place.
    fn repack(&mut self, on_progress: &mut impl FnMut(Progress)) -> Result<RepackReport, RepackOutcome> {
        let demands = build_demands(&self.desired, self.n);

        let capacity = check_capacity(&demands.demands, self.n);
        if !capacity.is_satisfied() {
            return Err(RepackOutcome::Recoverable(RepackError::CapacityExceeded(
                capacity,
            )));
        }

        let lock_conflicts = validate_live_locks(&self.locks, &demands, self.n);
        if !lock_conflicts.is_empty() {
            return Err(RepackOutcome::Recoverable(RepackError::LockConflict(
                lock_conflicts,
            )));
        }

        let old_committed = self.committed.clone();
        let desired_ref = &self.desired;
        let previous_ref = &self.previous;
        let n = self.n;
        let demand_previous_spine = move |_idx: usize, d: &Demand| -> Option<SpineId> {
            old_committed
                .spine_for_demand(d.input, d.egress_block)
                .or_else(|| previous_spine_hint(desired_ref, previous_ref, d.input, d.egress_block, n))
        };

        let started = Instant::now();
        let result = solve(
            &demands,
            self.n,
            &self.previous,
            &self.locks,
            demand_previous_spine,
            on_progress,
        );
        let solve_ms = started.elapsed().as_secs_f64() * 1000.0;

        let (assignment, cost) = match result {
            Solved::Unsat => {
                return Err(RepackOutcome::Recoverable(RepackError::Unsat(capacity)));
            }
            Solved::Found { assignment, cost } => (assignment, cost),
        };

        if self.strict_stability && cost > 0 {
            return Err(RepackOutcome::Recoverable(
                RepackError::StrictStabilityViolation(cost),
            ));
        }

        let old_committed_for_metrics = self.committed.clone();
        let new_committed = commit(&demands, &self.desired, &assignment, self.n)
            .map_err(RepackOutcome::Fatal)?;

        let mut metrics = compute_commit_metrics(
            &new_committed,
            &old_committed_for_metrics,
            &self.previous,
            &self.desired,
            &self.locks,
            &demands,
            self.n,
        );
        metrics.stability_changes = cost;

        if self.counters.repack_count == 0 {
            self.counters.initial_route_count = u64::from(metrics.routes_active);
        }
        self.counters.repack_count += 1;
        self.counters.solve_last_ms = solve_ms;
        self.counters.solve_total_ms += solve_ms;
        self.counters.reroutes_demands += u64::from(cost);
        self.counters.reroutes_outputs += u64::from(metrics.reroutes_outputs_delta);

        self.committed = new_committed;

        Ok(RepackReport { metrics, solve_ms })
    }
}

/// What prevented a repack from producing a committed state.
enum RepackOutcome {
    /// The desired-state edit should be undone and the old state re-repacked.
    Recoverable(RepackError),
    /// A solver bug; must not be retried or silently absorbed.
    Fatal(crate::error::InvariantViolation),
}

/// Falls back to the process-startup previous-state snapshot when no in-process
/// committed spine exists yet for this demand: any port this input already owns
/// in `egress_block` that had a recorded prior spine is taken as the hint.
fn previous_spine_hint(
    desired: &DesiredState,
    previous: &PreviousState,
    input: InputId,
    egress_block: BlockId,
    n: u32,
) -> Option<SpineId> {
    desired
        .iter()
        .filter(|&(port, owner)| *owner == input && port.block(n) == egress_block)
        .find_map(|(port, _)| previous.spine_of(*port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::load_locks;

    fn ports(raw: &[u32]) -> Vec<PortId> {
        raw.iter().map(|&p| PortId::new(p).unwrap()).collect()
    }

    #[test]
    fn single_route_commits_and_updates_counters() {
        let (locks, _) = load_locks(&[], 10);
        let mut ctx = FabricContext::new(10, false, PreviousState::default(), locks);
        let report = ctx
            .apply_route(InputId::new(1).unwrap(), &ports(&[11]), |_| {})
            .expect("route should succeed");
        assert_eq!(report.metrics.routes_active, 1);
        assert_eq!(ctx.counters.repack_count, 1);
        assert_eq!(ctx.counters.initial_route_count, 1);
    }

    #[test]
    fn saturating_a_block_exactly_at_capacity_still_succeeds() {
        let (locks, _) = load_locks(&[], 4);
        let mut ctx = FabricContext::new(4, false, PreviousState::default(), locks);
        for (input, port) in [(1, 1), (2, 2), (3, 3), (4, 4)] {
            ctx.apply_route(InputId::new(input).unwrap(), &ports(&[port]), |_| {})
                .expect("four distinct inputs exactly fill block 0's four ports");
        }
    }

    #[test]
    fn route_request_with_out_of_range_input_is_rejected_before_touching_desired_state() {
        let (locks, _) = load_locks(&[], 4);
        let mut ctx = FabricContext::new(4, false, PreviousState::default(), locks);
        let before = ctx.desired.clone();
        let err = ctx
            .apply_route(InputId::new(17).unwrap(), &ports(&[1]), |_| {})
            .expect_err("input 17 exceeds max_port=16 for radix 4");
        assert!(matches!(
            err,
            ApplyError::Request(RequestError::InputOutOfRange { input: 17, max: 16 })
        ));
        assert_eq!(ctx.desired, before);
    }

    #[test]
    fn reassigning_an_owned_port_to_a_different_input_is_rejected_without_mutation() {
        let (locks, _) = load_locks(&[], 10);
        let mut ctx = FabricContext::new(10, false, PreviousState::default(), locks);
        ctx.apply_route(InputId::new(1).unwrap(), &ports(&[11]), |_| {})
            .unwrap();

        let before = ctx.desired.clone();
        let err = ctx
            .apply_route(InputId::new(2).unwrap(), &ports(&[11]), |_| {})
            .expect_err("port 11 is already owned by input 1");
        assert!(matches!(
            err,
            ApplyError::Request(RequestError::PortAlreadyOwned { .. })
        ));
        assert_eq!(ctx.desired, before);
    }

    #[test]
    fn clear_on_unused_input_is_a_no_op() {
        let (locks, _) = load_locks(&[], 10);
        let mut ctx = FabricContext::new(10, false, PreviousState::default(), locks);
        let report = ctx
            .apply_clear(InputId::new(9).unwrap(), |_| {})
            .expect("clearing an unused input must succeed trivially");
        assert_eq!(report.metrics.routes_active, 0);
    }

    #[test]
    fn route_then_clear_restores_empty_state() {
        let (locks, _) = load_locks(&[], 10);
        let mut ctx = FabricContext::new(10, false, PreviousState::default(), locks);
        ctx.apply_route(InputId::new(1).unwrap(), &ports(&[11, 12]), |_| {})
            .unwrap();
        ctx.apply_clear(InputId::new(1).unwrap(), |_| {}).unwrap();
        assert!(ctx.desired.is_empty());
        assert_eq!(ctx.committed.port_owner(PortId::new(11).unwrap()), None);
    }
}
