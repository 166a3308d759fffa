//! User-pinned `(input, egress-block, spine)` triples and their feasibility checks.
//!
//! A lock is "live" only when its `(input, egress_block)` demand actually exists in
//! the current desired state; dormant locks are silently ignored (§4.3). Locks are
//! loaded once per process invocation and are read-only thereafter (§3).

use std::collections::{BTreeMap, BTreeSet};

use crate::demand::DemandSet;
use crate::ident::{BlockId, InputId, SpineId};

/// Why a lock was rejected or flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockConflictReason {
    /// The lock referenced an input, egress block, or spine outside valid ranges.
    Range,
    /// Two live locks force the same stage-1 or stage-2 trunk to carry two
    /// different inputs.
    Conflict,
}

impl LockConflictReason {
    /// The wire-format spelling of this reason (`"RANGE"` / `"CONFLICT"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Range => "RANGE",
            Self::Conflict => "CONFLICT",
        }
    }
}

/// A single reported lock conflict, carrying the raw (possibly out-of-range)
/// values from the input record so the report is useful even when the record
/// could not be turned into domain types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConflict {
    /// Raw input id as given in the lock record.
    pub input: i64,
    /// Raw egress-block index as given in the lock record.
    pub egress_block: i64,
    /// Raw spine index as given in the lock record.
    pub spine: i64,
    /// Why this lock was flagged.
    pub reason: LockConflictReason,
}

/// A raw lock record as read from the locks JSON file, prior to range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLock {
    /// Raw input id.
    pub input: i64,
    /// Raw egress-block index.
    pub egress_block: i64,
    /// Raw spine index.
    pub spine: i64,
}

/// Validated, range-checked locks, keyed by the demand they pin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockStore {
    pinned: BTreeMap<(InputId, BlockId), SpineId>,
}

impl LockStore {
    /// The pinned spine for `(input, egress_block)`, if any.
    #[must_use]
    pub fn spine_for(&self, input: InputId, egress_block: BlockId) -> Option<SpineId> {
        self.pinned.get(&(input, egress_block)).copied()
    }

    /// Number of validated (range-checked) locks, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    /// Whether there are no validated locks at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    /// Iterates every validated `((input, egress_block), spine)` entry.
    pub fn iter(&self) -> impl Iterator<Item = (&(InputId, BlockId), &SpineId)> {
        self.pinned.iter()
    }
}

/// Range-checks raw lock records and builds a [`LockStore`] from the ones that
/// pass. Out-of-range records are reported as `RANGE` conflicts and dropped; they
/// never enter the store at all (so a later, in-range record for the same
/// `(input, egress_block)` is not masked by a malformed one).
#[must_use]
pub fn load_locks(records: &[RawLock], n: u32) -> (LockStore, Vec<LockConflict>) {
    let mut pinned = BTreeMap::new();
    let mut conflicts = Vec::new();

    for record in records {
        let in_range = record.input > 0
            && record.egress_block >= 0
            && (record.egress_block as u64) < u64::from(n)
            && record.spine >= 0
            && (record.spine as u64) < u64::from(n);
        if !in_range {
            conflicts.push(LockConflict {
                input: record.input,
                egress_block: record.egress_block,
                spine: record.spine,
                reason: LockConflictReason::Range,
            });
            continue;
        }
        let Some(input) = InputId::new(record.input as u32) else {
            conflicts.push(LockConflict {
                input: record.input,
                egress_block: record.egress_block,
                spine: record.spine,
                reason: LockConflictReason::Range,
            });
            continue;
        };
        let egress_block = BlockId(record.egress_block as usize);
        let spine = SpineId(record.spine as usize);
        pinned.insert((input, egress_block), spine);
    }

    (LockStore { pinned }, conflicts)
}

/// Checks pairwise feasibility of the *live* subset of `store` (locks whose
/// demand exists in `demands`) and returns any `CONFLICT`s found. Dormant locks
/// are ignored entirely, matching §4.3.
#[must_use]
pub fn validate_live_locks(store: &LockStore, demands: &DemandSet, n: u32) -> Vec<LockConflict> {
    let live: Vec<(InputId, BlockId, SpineId)> = store
        .iter()
        .filter(|((input, egress_block), _)| {
            demands
                .egress_blocks_by_input
                .get(input)
                .is_some_and(|blocks| blocks.contains(egress_block))
        })
        .map(|((input, egress_block), spine)| (*input, *egress_block, *spine))
        .collect();

    // Stage-1 trunk key: (ingress_block(input), spine). Stage-2 trunk key:
    // (spine, egress_block). Group live locks by each key; any group spanning
    // more than one distinct input is a conflict.
    let mut by_stage1: BTreeMap<(BlockId, SpineId), BTreeSet<InputId>> = BTreeMap::new();
    let mut by_stage2: BTreeMap<(SpineId, BlockId), BTreeSet<InputId>> = BTreeMap::new();
    for (input, egress_block, spine) in &live {
        by_stage1
            .entry((input.block(n), *spine))
            .or_default()
            .insert(*input);
        by_stage2
            .entry((*spine, *egress_block))
            .or_default()
            .insert(*input);
    }

    let mut conflicting_keys_stage1 = BTreeSet::new();
    for (key, inputs) in &by_stage1 {
        if inputs.len() > 1 {
            conflicting_keys_stage1.insert(*key);
        }
    }
    let mut conflicting_keys_stage2 = BTreeSet::new();
    for (key, inputs) in &by_stage2 {
        if inputs.len() > 1 {
            conflicting_keys_stage2.insert(*key);
        }
    }

    let mut conflicts = Vec::new();
    for (input, egress_block, spine) in &live {
        let in_stage1_conflict = conflicting_keys_stage1.contains(&(input.block(n), *spine));
        let in_stage2_conflict = conflicting_keys_stage2.contains(&(*spine, *egress_block));
        if in_stage1_conflict || in_stage2_conflict {
            conflicts.push(LockConflict {
                input: i64::from(input.get()),
                egress_block: egress_block.0 as i64,
                spine: spine.0 as i64,
                reason: LockConflictReason::Conflict,
            });
        }
    }
    conflicts
}
