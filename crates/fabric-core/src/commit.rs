//! Installs a solver result into the fabric tables and re-verifies invariants.
//!
//! The committer never mutates [`CommittedState`] in place: it always builds a
//! fresh one from the solver's assignment, so a partially-applied commit can
//! never be observed (§4.5).

use crate::demand::DemandSet;
use crate::error::InvariantViolation;
use crate::ident::SpineId;
use crate::solver::Assignment;
use crate::state::{CommittedState, DesiredState};

/// Builds the committed state implied by `assignment` over `demands` and `desired`,
/// then validates it. Returns the fresh state, or an [`InvariantViolation`] if the
/// reconstructed tables fail to satisfy I1–I4 (which can only indicate a solver bug).
pub fn commit(
    demands: &DemandSet,
    desired: &DesiredState,
    assignment: &Assignment,
    n: u32,
) -> Result<CommittedState, InvariantViolation> {
    let mut state = CommittedState::empty(n);

    for (idx, demand) in demands.demands.iter().enumerate() {
        let Some(spine) = assignment.spine_for(idx) else {
            return Err(InvariantViolation(format!(
                "solver returned no spine for demand (input {}, egress block {})",
                demand.input, demand.egress_block
            )));
        };
        state.set_stage1(demand.ingress_block, spine, Some(demand.input));
        state.set_stage2(spine, demand.egress_block, Some(demand.input));
    }

    for (port, input) in desired.iter() {
        let egress_block = port.block(n);
        let spine = demands
            .demands
            .iter()
            .position(|d| d.input == *input && d.egress_block == egress_block)
            .and_then(|idx| assignment.spine_for(idx));
        state.set_port(*port, Some(*input), spine);
    }

    validate(&state, desired, n)?;
    Ok(state)
}

/// Re-checks invariants I1–I4 against a freshly built committed state.
fn validate(state: &CommittedState, desired: &DesiredState, n: u32) -> Result<(), InvariantViolation> {
    // I3: port-owner must equal desired-owner everywhere.
    for (port, input) in desired.iter() {
        if state.port_owner(*port) != Some(*input) {
            return Err(InvariantViolation(format!(
                "port {port} owner mismatch: desired {input}, committed {:?}",
                state.port_owner(*port)
            )));
        }
    }

    // I1, I2: every connected port's spine must agree with both trunk tables.
    for (port, spine) in state.iter_port_spines() {
        let Some(owner) = state.port_owner(*port) else {
            return Err(InvariantViolation(format!(
                "port {port} has a spine but no owner"
            )));
        };
        let egress_block = port.block(n);
        if state.stage2_owner(*spine, egress_block) != Some(owner) {
            return Err(InvariantViolation(format!(
                "port {port}: stage-2[{spine}][{egress_block}] does not own input {owner}"
            )));
        }
        let ingress_block = owner.block(n);
        if state.stage1_owner(ingress_block, *spine) != Some(owner) {
            return Err(InvariantViolation(format!(
                "port {port}: stage-1[{ingress_block}][{spine}] does not own input {owner}"
            )));
        }
    }

    // I4 holds by construction: each (block, spine) trunk slot is a single
    // `Option<InputId>`, so two distinct inputs can never occupy one trunk.

    Ok(())
}
