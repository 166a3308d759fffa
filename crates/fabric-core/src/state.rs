//! The fabric's pure data tables: desired end-state, committed assignment, and the
//! previous commit's spine choices (used only as a stability hint).
//!
//! None of these types know how to compute an assignment; they are plain
//! containers. See [`crate::solver`] and [`crate::commit`] for the logic that
//! populates and validates them.

use std::collections::BTreeMap;

use crate::ident::{BlockId, InputId, PortId, SpineId};

/// The authoritative end-state: which input (if any) each output port should
/// deliver. Absence of a key means "disconnected" (wire value `0`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    owner: BTreeMap<PortId, InputId>,
}

impl DesiredState {
    /// Assigns `port` to `input`, overwriting any previous owner.
    pub fn set(&mut self, port: PortId, input: InputId) {
        self.owner.insert(port, input);
    }

    /// Disconnects `port`, returning its previous owner if any.
    pub fn unset(&mut self, port: PortId) -> Option<InputId> {
        self.owner.remove(&port)
    }

    /// Returns the current owner of `port`, if connected.
    #[must_use]
    pub fn owner_of(&self, port: PortId) -> Option<InputId> {
        self.owner.get(&port).copied()
    }

    /// Iterates all connected `(port, input)` pairs in port order.
    pub fn iter(&self) -> impl Iterator<Item = (&PortId, &InputId)> {
        self.owner.iter()
    }

    /// Removes every port currently owned by `input`, returning the freed ports.
    pub fn clear_input(&mut self, input: InputId) -> Vec<PortId> {
        let ports: Vec<PortId> = self
            .owner
            .iter()
            .filter(|(_, owner)| **owner == input)
            .map(|(port, _)| *port)
            .collect();
        for port in &ports {
            self.owner.remove(port);
        }
        ports
    }

    /// Number of connected ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owner.len()
    }

    /// Whether no ports are connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
    }
}

/// The four jointly-consistent tables describing the currently committed
/// assignment (§3). Always replaced wholesale by the committer, never mutated
/// in place, so a partially-applied commit is never observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedState {
    /// Radix this state was built for.
    pub n: u32,
    /// Stage-1 ownership: `stage1[block.0][spine.0]`.
    stage1: Vec<Vec<Option<InputId>>>,
    /// Stage-2 ownership: `stage2[spine.0][block.0]`.
    stage2: Vec<Vec<Option<InputId>>>,
    /// Port owner, mirroring the desired state after a successful commit.
    port_owner: BTreeMap<PortId, InputId>,
    /// Port spine, `None` iff the port is disconnected.
    port_spine: BTreeMap<PortId, SpineId>,
}

impl CommittedState {
    /// Builds an all-empty committed state for radix `n`.
    #[must_use]
    pub fn empty(n: u32) -> Self {
        let n_usize = n as usize;
        Self {
            n,
            stage1: vec![vec![None; n_usize]; n_usize],
            stage2: vec![vec![None; n_usize]; n_usize],
            port_owner: BTreeMap::new(),
            port_spine: BTreeMap::new(),
        }
    }

    /// Stage-1 trunk owner at `(block, spine)`.
    #[must_use]
    pub fn stage1_owner(&self, block: BlockId, spine: SpineId) -> Option<InputId> {
        self.stage1[block.0][spine.0]
    }

    /// Stage-2 trunk owner at `(spine, block)`.
    #[must_use]
    pub fn stage2_owner(&self, spine: SpineId, block: BlockId) -> Option<InputId> {
        self.stage2[spine.0][block.0]
    }

    /// Current owner of output port `port`.
    #[must_use]
    pub fn port_owner(&self, port: PortId) -> Option<InputId> {
        self.port_owner.get(&port).copied()
    }

    /// Spine serving output port `port`, or `None` if disconnected.
    #[must_use]
    pub fn port_spine(&self, port: PortId) -> Option<SpineId> {
        self.port_spine.get(&port).copied()
    }

    /// Iterates all `(port, spine)` pairs for currently-connected ports.
    pub fn iter_port_spines(&self) -> impl Iterator<Item = (&PortId, &SpineId)> {
        self.port_spine.iter()
    }

    /// The spine currently carrying the `(input, egress_block)` demand, found by
    /// scanning the stage-2 column for `egress_block`. Used as the solver's
    /// stability hint across repacks within one process.
    #[must_use]
    pub fn spine_for_demand(&self, input: InputId, egress_block: BlockId) -> Option<SpineId> {
        (0..self.n as usize)
            .map(SpineId)
            .find(|s| self.stage2[s.0][egress_block.0] == Some(input))
    }

    /// Sets a stage-1 trunk owner. Used only by the committer during
    /// reconstruction, never by the solver (which restores in place on its own
    /// working copy — see [`crate::solver`]).
    pub(crate) fn set_stage1(&mut self, block: BlockId, spine: SpineId, owner: Option<InputId>) {
        self.stage1[block.0][spine.0] = owner;
    }

    /// Sets a stage-2 trunk owner. See [`Self::set_stage1`].
    pub(crate) fn set_stage2(&mut self, spine: SpineId, block: BlockId, owner: Option<InputId>) {
        self.stage2[spine.0][block.0] = owner;
    }

    /// Sets a port's owner and serving spine together.
    pub(crate) fn set_port(&mut self, port: PortId, owner: Option<InputId>, spine: Option<SpineId>) {
        match owner {
            Some(i) => {
                self.port_owner.insert(port, i);
            }
            None => {
                self.port_owner.remove(&port);
            }
        }
        match spine {
            Some(s) => {
                self.port_spine.insert(port, s);
            }
            None => {
                self.port_spine.remove(&port);
            }
        }
    }
}

/// The prior commit's port-to-spine mapping, used only to bias the solver toward
/// stability. Disjoint from [`CommittedState`]: it is a read-only snapshot loaded
/// once at process startup (§5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousState {
    port_spine: BTreeMap<PortId, SpineId>,
}

impl PreviousState {
    /// Builds a previous state from an explicit port-spine map.
    #[must_use]
    pub fn from_map(port_spine: BTreeMap<PortId, SpineId>) -> Self {
        Self { port_spine }
    }

    /// The spine previously serving `port`, if it was connected.
    #[must_use]
    pub fn spine_of(&self, port: PortId) -> Option<SpineId> {
        self.port_spine.get(&port).copied()
    }

    /// Iterates every `(port, spine)` pair known from the prior run.
    pub fn iter_port_spines(&self) -> impl Iterator<Item = (&PortId, &SpineId)> {
        self.port_spine.iter()
    }
}

/// Cumulative counters carried across commands within one process invocation
/// (§3). Reset only when the fabric context is (re)initialized for a radix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CumulativeCounters {
    /// Number of routes present the first time the fabric was populated.
    pub initial_route_count: u64,
    /// Sum of per-commit demand-level spine changes across all commands.
    pub reroutes_demands: u64,
    /// Sum of per-commit output-level (port) spine changes across all commands.
    pub reroutes_outputs: u64,
    /// Total wall-clock time spent in the solver, in milliseconds.
    pub solve_total_ms: f64,
    /// Wall-clock time spent in the solver for the most recent repack, in
    /// milliseconds.
    pub solve_last_ms: f64,
    /// Number of repacks attempted (successful or not).
    pub repack_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_input_removes_only_that_inputs_ports() {
        let mut d = DesiredState::default();
        let i1 = InputId::new(1).unwrap();
        let i2 = InputId::new(2).unwrap();
        d.set(PortId::new(1).unwrap(), i1);
        d.set(PortId::new(2).unwrap(), i1);
        d.set(PortId::new(3).unwrap(), i2);

        let freed = d.clear_input(i1);
        assert_eq!(freed.len(), 2);
        assert_eq!(d.len(), 1);
        assert_eq!(d.owner_of(PortId::new(3).unwrap()), Some(i2));
    }

    #[test]
    fn empty_committed_state_has_no_owners() {
        let n = 4;
        let s = CommittedState::empty(n);
        for raw in 1..=(n * n) {
            let port = PortId::new(raw).unwrap();
            assert_eq!(s.port_owner(port), None);
            assert_eq!(s.port_spine(port), None);
        }
    }
}
