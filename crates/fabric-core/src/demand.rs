//! Derives the demand set from the desired end-state.
//!
//! A demand is a `(input, ingress_block, egress_block)` triple that must be routed
//! through exactly one spine. The builder is pure and deterministic: given the same
//! desired state it always emits the same ordered demand list.

use std::collections::{BTreeMap, BTreeSet};

use crate::ident::{BlockId, InputId};
use crate::state::DesiredState;

/// A single `(input, egress-block)` requirement implied by the desired state.
///
/// `ingress_block` is fully determined by `input` (`block(input)`), but is carried
/// alongside so downstream code never has to re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Demand {
    /// The input that needs a path.
    pub input: InputId,
    /// The ingress block `input` belongs to.
    pub ingress_block: BlockId,
    /// The egress block this demand must reach.
    pub egress_block: BlockId,
}

/// The demand set plus a per-input index of which egress blocks it needs, used by
/// the solver's stability tie-breaking pass.
#[derive(Debug, Clone, Default)]
pub struct DemandSet {
    /// Demands in deterministic (input, then egress block) order.
    pub demands: Vec<Demand>,
    /// For each input, the set of egress blocks it demands (bounded by radix `N`).
    pub egress_blocks_by_input: BTreeMap<InputId, BTreeSet<BlockId>>,
}

impl DemandSet {
    /// Number of demands (variables the solver must assign).
    #[must_use]
    pub fn len(&self) -> usize {
        self.demands.len()
    }

    /// Whether there are no demands at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.demands.is_empty()
    }
}

/// Builds the demand set for `desired` under radix `n`.
///
/// `D = {(i, block(i), e) | exists port p in block e with desired_owner[p] = i}`.
/// The result has no duplicate `(input, egress_block)` pairs.
#[must_use]
pub fn build_demands(desired: &DesiredState, n: u32) -> DemandSet {
    let mut pairs: BTreeSet<(InputId, BlockId)> = BTreeSet::new();
    for (port, input) in desired.iter() {
        let egress_block = port.block(n);
        pairs.insert((*input, egress_block));
    }

    let mut demands = Vec::with_capacity(pairs.len());
    let mut egress_blocks_by_input: BTreeMap<InputId, BTreeSet<BlockId>> = BTreeMap::new();
    for (input, egress_block) in pairs {
        let ingress_block = input.block(n);
        demands.push(Demand {
            input,
            ingress_block,
            egress_block,
        });
        egress_blocks_by_input
            .entry(input)
            .or_default()
            .insert(egress_block);
    }

    DemandSet {
        demands,
        egress_blocks_by_input,
    }
}
