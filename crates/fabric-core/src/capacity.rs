//! Cheap, necessary (not sufficient) feasibility pre-check on block occupancy.
//!
//! Run before the backtracking solver so that a clearly infeasible desired state
//! never pays for a search. See `SPEC_FULL.md` §4.2 for the exact formulas: each
//! egress block's distinct-demanding-input count must not exceed the radix, and
//! likewise for each ingress block's distinct-active-input count.

use std::fmt;

use crate::demand::Demand;
use crate::ident::BlockId;

/// Per-block occupancy load, used both to decide feasibility and to render the
/// `UNSAT DETAILS:` breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLoad {
    /// The block this load describes.
    pub block: BlockId,
    /// Number of distinct inputs demanding (or occupying) this block.
    pub count: u32,
    /// Capacity available (equal to the radix `N`).
    pub capacity: u32,
}

impl BlockLoad {
    /// Whether this block's load stays within capacity.
    #[must_use]
    pub fn is_within_capacity(self) -> bool {
        self.count <= self.capacity
    }
}

/// Full capacity breakdown: per-block loads on both the ingress and egress side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityReport {
    /// Load per egress block, in block order.
    pub egress: Vec<BlockLoad>,
    /// Load per ingress block, in block order.
    pub ingress: Vec<BlockLoad>,
}

impl CapacityReport {
    /// Whether every block (ingress and egress) stays within capacity.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.egress.iter().all(|l| l.is_within_capacity())
            && self.ingress.iter().all(|l| l.is_within_capacity())
    }

    /// Blocks (ingress or egress) that exceed their capacity, as display-ready lines.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for load in &self.egress {
            if !load.is_within_capacity() {
                lines.push(format!(
                    "Egress block {} needs {} distinct inputs (capacity {})",
                    load.block, load.count, load.capacity
                ));
            }
        }
        for load in &self.ingress {
            if !load.is_within_capacity() {
                lines.push(format!(
                    "Ingress block {} needs {} distinct inputs (capacity {})",
                    load.block, load.count, load.capacity
                ));
            }
        }
        lines
    }
}

impl fmt::Display for CapacityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let violations = self.violations();
        if violations.is_empty() {
            write!(f, "all blocks within capacity")
        } else {
            write!(f, "{}", violations.join("; "))
        }
    }
}

/// Computes the capacity report for a demand set under radix `n`.
///
/// `n` doubles as both the number of ports per block and the number of trunks
/// (spines) available to/from each block, matching the symmetric C(N,N,N) model.
#[must_use]
pub fn check_capacity(demands: &[Demand], n: u32) -> CapacityReport {
    let mut egress_counts = vec![0u32; n as usize];
    let mut ingress_counts = vec![0u32; n as usize];

    // Distinct-input counting per block: a demand set built by `build_demands`
    // already contains each (input, egress_block) pair at most once, so counting
    // demands per egress block already counts distinct inputs. Ingress counting
    // needs a dedup pass since one input can appear in several demands (multicast).
    for d in demands {
        egress_counts[d.egress_block.0] += 1;
    }

    let mut seen_per_ingress: Vec<std::collections::BTreeSet<u32>> =
        vec![std::collections::BTreeSet::new(); n as usize];
    for d in demands {
        seen_per_ingress[d.ingress_block.0].insert(d.input.get());
    }
    for (b, seen) in seen_per_ingress.iter().enumerate() {
        ingress_counts[b] = seen.len() as u32;
    }

    let egress = egress_counts
        .into_iter()
        .enumerate()
        .map(|(b, count)| BlockLoad {
            block: BlockId(b),
            count,
            capacity: n,
        })
        .collect();
    let ingress = ingress_counts
        .into_iter()
        .enumerate()
        .map(|(b, count)| BlockLoad {
            block: BlockId(b),
            count,
            capacity: n,
        })
        .collect();

    CapacityReport { egress, ingress }
}
