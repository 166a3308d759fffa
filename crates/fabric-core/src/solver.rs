//! MRV-ordered backtracking search over spine assignments.
//!
//! One variable per demand. A demand's domain is the set of spines that leave
//! both its stage-1 and stage-2 trunk free (or already owned by its own input).
//! The objective is to minimize the number of demands whose chosen spine differs
//! from their previous one; a cost of zero is optimal and stops the search early.

use std::time::{Duration, Instant};

use crate::demand::{Demand, DemandSet};
use crate::ident::{BlockId, InputId, SpineId};
use crate::locks::LockStore;
use crate::state::PreviousState;

/// How often (minimum wall-clock gap) the solver may emit a progress callback.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// A fully- or partially-searched assignment: one spine per demand index,
/// `None` while unassigned.
#[derive(Debug, Clone)]
pub struct Assignment {
    spines: Vec<Option<SpineId>>,
}

impl Assignment {
    /// The spine chosen for demand `index`, if assigned.
    #[must_use]
    pub fn spine_for(&self, index: usize) -> Option<SpineId> {
        self.spines[index]
    }
}

/// One progress sample, emitted at most once per [`PROGRESS_INTERVAL`].
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Total assignment attempts so far (successful or abandoned).
    pub attempts: u64,
    /// Wall-clock time elapsed since search began.
    pub elapsed: Duration,
    /// Current search depth (demands assigned on the active path).
    pub depth: usize,
    /// Total number of demands being solved for.
    pub total: usize,
    /// Best stability cost found so far, if any candidate has been found.
    pub best_cost: Option<u32>,
}

/// Result of a completed search.
pub enum Solved {
    /// A full assignment was found, with its stability cost.
    Found { assignment: Assignment, cost: u32 },
    /// No full assignment exists at all.
    Unsat,
}

struct TrunkTables {
    /// `stage1[block][spine]`.
    stage1: Vec<Vec<Option<InputId>>>,
    /// `stage2[spine][block]`.
    stage2: Vec<Vec<Option<InputId>>>,
}

impl TrunkTables {
    fn empty(n: usize) -> Self {
        Self {
            stage1: vec![vec![None; n]; n],
            stage2: vec![vec![None; n]; n],
        }
    }
}

/// Per-demand fixed data used repeatedly during search, computed once up front.
struct Var {
    input: InputId,
    ingress_block: BlockId,
    egress_block: BlockId,
    /// Locked spine, if this demand is covered by a live lock.
    locked: Option<SpineId>,
    /// Previous spine for this exact (input, egress_block) demand, if any.
    previous: Option<SpineId>,
}

/// Drives the backtracking search to completion.
///
/// `on_progress` is invoked at most roughly once every five seconds of wall
/// time; it never affects control flow, only observability.
pub fn solve(
    demands: &DemandSet,
    n: u32,
    previous: &PreviousState,
    locks: &LockStore,
    demand_previous_spine: impl Fn(usize, &Demand) -> Option<SpineId>,
    mut on_progress: impl FnMut(Progress),
) -> Solved {
    let n = n as usize;
    let vars: Vec<Var> = demands
        .demands
        .iter()
        .enumerate()
        .map(|(idx, d)| {
            let locked = locks.spine_for(d.input, d.egress_block);
            Var {
                input: d.input,
                ingress_block: d.ingress_block,
                egress_block: d.egress_block,
                locked,
                previous: demand_previous_spine(idx, d),
            }
        })
        .collect();
    let _ = previous; // previous spines arrive pre-resolved via demand_previous_spine

    let mut search = Search {
        n,
        vars,
        tables: TrunkTables::empty(n),
        assigned: vec![None; demands.len()],
        used_by_input: std::collections::HashMap::new(),
        cost: 0,
        best: None,
        best_cost: u32::MAX,
        attempts: 0,
        started: Instant::now(),
        last_report: Instant::now(),
    };

    search.run(0, &mut on_progress);

    match search.best {
        Some(spines) => Solved::Found {
            assignment: Assignment { spines },
            cost: search.best_cost,
        },
        None => Solved::Unsat,
    }
}

struct Search {
    n: usize,
    vars: Vec<Var>,
    tables: TrunkTables,
    assigned: Vec<Option<SpineId>>,
    used_by_input: std::collections::HashMap<InputId, u64>,
    cost: u32,
    best: Option<Vec<Option<SpineId>>>,
    best_cost: u32,
    attempts: u64,
    started: Instant,
    last_report: Instant,
}

impl Search {
    /// Spines that leave both trunks for demand `idx` free or owned by its own input.
    fn domain(&self, idx: usize) -> Vec<SpineId> {
        let var = &self.vars[idx];
        if let Some(s) = var.locked {
            return if self.trunk_free(var, s) { vec![s] } else { vec![] };
        }
        (0..self.n)
            .map(SpineId)
            .filter(|s| self.trunk_free(var, *s))
            .collect()
    }

    fn trunk_free(&self, var: &Var, s: SpineId) -> bool {
        let stage1_ok = match self.tables.stage1[var.ingress_block.0][s.0] {
            None => true,
            Some(owner) => owner == var.input,
        };
        let stage2_ok = match self.tables.stage2[s.0][var.egress_block.0] {
            None => true,
            Some(owner) => owner == var.input,
        };
        stage1_ok && stage2_ok
    }

    /// Picks the unassigned demand with the fewest remaining domain values.
    /// Returns `None` once every demand is assigned.
    fn pick_mrv(&self) -> Option<(usize, Vec<SpineId>)> {
        let mut best: Option<(usize, Vec<SpineId>)> = None;
        for idx in 0..self.vars.len() {
            if self.assigned[idx].is_some() {
                continue;
            }
            let domain = self.domain(idx);
            if domain.len() == 1 {
                return Some((idx, domain));
            }
            let better = match &best {
                None => true,
                Some((_, cur)) => domain.len() < cur.len(),
            };
            if better {
                best = Some((idx, domain));
            }
        }
        best
    }

    /// Orders `domain` per the three-pass policy (§4.4): previous spine first,
    /// then spines already used by this input, then the rest in index order.
    fn order_values(&self, idx: usize, mut domain: Vec<SpineId>) -> Vec<SpineId> {
        let var = &self.vars[idx];
        let used_mask = self.used_by_input.get(&var.input).copied().unwrap_or(0);
        let previous = var.previous;
        domain.sort_by_key(|s| {
            let pass0 = previous != Some(*s);
            let pass1 = used_mask & (1u64 << s.0) == 0;
            (pass0, pass1, s.0)
        });
        domain
    }

    fn run(&mut self, depth: usize, on_progress: &mut impl FnMut(Progress)) {
        if self.last_report.elapsed() >= PROGRESS_INTERVAL {
            self.last_report = Instant::now();
            on_progress(Progress {
                attempts: self.attempts,
                elapsed: self.started.elapsed(),
                depth,
                total: self.vars.len(),
                best_cost: (self.best_cost != u32::MAX).then_some(self.best_cost),
            });
        }

        if self.cost >= self.best_cost {
            return;
        }

        let Some((idx, domain)) = self.pick_mrv() else {
            // Every demand assigned: record if this beats the incumbent.
            if self.cost < self.best_cost {
                self.best_cost = self.cost;
                self.best = Some(self.assigned.clone());
            }
            return;
        };

        if domain.is_empty() {
            return;
        }

        let ordered = self.order_values(idx, domain);
        let var_input = self.vars[idx].input;
        let var_ingress = self.vars[idx].ingress_block;
        let var_egress = self.vars[idx].egress_block;
        let var_previous = self.vars[idx].previous;

        for spine in ordered {
            self.attempts += 1;

            let prev_stage1 = self.tables.stage1[var_ingress.0][spine.0];
            let prev_stage2 = self.tables.stage2[spine.0][var_egress.0];
            let prev_used_mask = self.used_by_input.get(&var_input).copied().unwrap_or(0);
            // A demand with no previous spine has nothing to preserve, so it
            // never itself contributes to stability cost.
            let cost_delta = match var_previous {
                Some(prev) => u32::from(prev != spine),
                None => 0,
            };

            self.tables.stage1[var_ingress.0][spine.0] = Some(var_input);
            self.tables.stage2[spine.0][var_egress.0] = Some(var_input);
            self.used_by_input
                .insert(var_input, prev_used_mask | (1u64 << spine.0));
            self.assigned[idx] = Some(spine);
            self.cost += cost_delta;

            if self.best_cost != 0 {
                self.run(depth + 1, on_progress);
            }

            // Bit-exact undo: restore exactly what was overwritten.
            self.cost -= cost_delta;
            self.assigned[idx] = None;
            if prev_used_mask == 0 {
                self.used_by_input.remove(&var_input);
            } else {
                self.used_by_input.insert(var_input, prev_used_mask);
            }
            self.tables.stage2[spine.0][var_egress.0] = prev_stage2;
            self.tables.stage1[var_ingress.0][spine.0] = prev_stage1;

            if self.best_cost == 0 {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::build_demands;
    use crate::ident::PortId;
    use crate::locks::{load_locks, RawLock};
    use crate::state::DesiredState;

    fn desired_with(pairs: &[(u32, u32)]) -> DesiredState {
        let mut d = DesiredState::default();
        for &(port, input) in pairs {
            d.set(PortId::new(port).unwrap(), InputId::new(input).unwrap());
        }
        d
    }

    fn no_previous(_idx: usize, _d: &Demand) -> Option<SpineId> {
        None
    }

    #[test]
    fn single_unicast_solves_with_one_spine() {
        let desired = desired_with(&[(11, 1)]);
        let demands = build_demands(&desired, 10);
        let (locks, _) = load_locks(&[], 10);
        let previous = PreviousState::default();
        let result = solve(&demands, 10, &previous, &locks, no_previous, |_| {});
        match result {
            Solved::Found { cost, .. } => assert_eq!(cost, 0),
            Solved::Unsat => panic!("expected a solution"),
        }
    }

    #[test]
    fn multicast_within_one_block_uses_a_single_spine() {
        let desired = desired_with(&[(11, 1), (12, 1), (13, 1)]);
        let demands = build_demands(&desired, 10);
        assert_eq!(demands.len(), 1);
        let (locks, _) = load_locks(&[], 10);
        let previous = PreviousState::default();
        let result = solve(&demands, 10, &previous, &locks, no_previous, |_| {});
        assert!(matches!(result, Solved::Found { cost: 0, .. }));
    }

    #[test]
    fn saturating_ingress_block_still_solves() {
        // N distinct inputs from block 0, each demanding all N egress blocks.
        let n = 4;
        let mut desired = DesiredState::default();
        for input in 1..=n {
            for egress_block in 0..n {
                let port = egress_block * n + input;
                desired.set(PortId::new(port).unwrap(), InputId::new(input).unwrap());
            }
        }
        let demands = build_demands(&desired, n);
        let (locks, _) = load_locks(&[], n);
        let previous = PreviousState::default();
        let result = solve(&demands, n, &previous, &locks, no_previous, |_| {});
        assert!(matches!(result, Solved::Found { .. }));
    }

    #[test]
    fn locked_demand_is_forced_onto_its_pinned_spine() {
        let desired = desired_with(&[(1, 1)]);
        let demands = build_demands(&desired, 4);
        let (locks, conflicts) = load_locks(
            &[RawLock {
                input: 1,
                egress_block: 0,
                spine: 3,
            }],
            4,
        );
        assert!(conflicts.is_empty());
        let previous = PreviousState::default();
        let result = solve(&demands, 4, &previous, &locks, no_previous, |_| {});
        match result {
            Solved::Found { assignment, .. } => {
                assert_eq!(assignment.spine_for(0), Some(SpineId(3)));
            }
            Solved::Unsat => panic!("expected a solution"),
        }
    }

    #[test]
    fn conflicting_locks_make_the_instance_unsat() {
        // Two different inputs pinned to the same spine into the same egress
        // block: no assignment can satisfy both.
        let desired = desired_with(&[(1, 1), (2, 2)]);
        let demands = build_demands(&desired, 4);
        let (locks, _) = load_locks(
            &[
                RawLock {
                    input: 1,
                    egress_block: 0,
                    spine: 3,
                },
                RawLock {
                    input: 2,
                    egress_block: 0,
                    spine: 3,
                },
            ],
            4,
        );
        let previous = PreviousState::default();
        let result = solve(&demands, 4, &previous, &locks, no_previous, |_| {});
        assert!(matches!(result, Solved::Unsat));
    }

    #[test]
    fn preserves_previous_spine_when_feasible() {
        let desired = desired_with(&[(11, 1), (22, 2)]);
        let demands = build_demands(&desired, 10);
        let previous_spine = |idx: usize, _: &Demand| -> Option<SpineId> {
            if idx == 0 {
                Some(SpineId(5))
            } else {
                None
            }
        };
        let (locks, _) = load_locks(&[], 10);
        let previous = PreviousState::default();
        let result = solve(&demands, 10, &previous, &locks, previous_spine, |_| {});
        match result {
            Solved::Found { assignment, cost } => {
                assert_eq!(cost, 0);
                assert_eq!(assignment.spine_for(0), Some(SpineId(5)));
            }
            Solved::Unsat => panic!("expected a solution"),
        }
    }
}
