//! The wire JSON: the final committed-state report (output) and the lenient
//! previous-state and locks readers (input). Field names and shapes here are a
//! literal contract (§6) — never renamed, reordered, or nested differently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::applier::{FabricContext, RepackReport};
use crate::ident::{PortId, SpineId};
use crate::locks::{LockConflict, LockConflictReason, RawLock};
use crate::state::PreviousState;

/// One entry of the `lock_conflicts` array.
#[derive(Debug, Clone, Serialize)]
pub struct LockConflictJson {
    /// Raw input id from the offending lock record.
    pub input: i64,
    /// Raw egress-block index from the offending lock record.
    pub egress_block: i64,
    /// Raw spine index from the offending lock record.
    pub spine: i64,
    /// `"RANGE"` or `"CONFLICT"`.
    pub reason: &'static str,
}

impl From<&LockConflict> for LockConflictJson {
    fn from(c: &LockConflict) -> Self {
        Self {
            input: c.input,
            egress_block: c.egress_block,
            spine: c.spine,
            reason: c.reason.as_str(),
        }
    }
}

/// The final committed-state report, written verbatim as the `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct FabricReport {
    /// Schema version; always `1`.
    pub version: u32,
    #[serde(rename = "N")]
    /// Fabric radix.
    pub n: u32,
    #[serde(rename = "TOTAL_BLOCKS")]
    /// Number of ingress (equivalently egress) blocks; equal to `N`.
    pub total_blocks: u32,
    #[serde(rename = "MAX_PORTS")]
    /// `N * N`.
    pub max_ports: u32,
    /// `s1_to_s2[block][spine]`: input id or `0`.
    pub s1_to_s2: Vec<Vec<i64>>,
    /// `s2_to_s3[spine][block]`: input id or `0`.
    pub s2_to_s3: Vec<Vec<i64>>,
    /// 1-indexed (index 0 unused): owner of port p, or `0`.
    pub s3_port_owner: Vec<i64>,
    /// 1-indexed (index 0 unused): spine serving port p, or `-1`.
    pub s3_port_spine: Vec<i64>,
    /// 1-indexed (index 0 unused): desired owner of port p, or `0`.
    pub desired_owner: Vec<i64>,
    /// This commit's demand-level stability cost.
    pub stability_changes: u32,
    /// Whether `--strict-stability` was active for this commit.
    pub strict_stability: bool,
    /// Every lock conflict encountered while validating this commit.
    pub lock_conflicts: Vec<LockConflictJson>,
    /// Solver wall-clock time for this commit, in milliseconds.
    pub solve_ms: f64,
    /// Cumulative solver wall-clock time across this process invocation.
    pub solve_total_ms: f64,
    /// Number of repacks attempted (successful or not) this invocation.
    pub repack_count: u64,
    /// Cumulative demand-level reroutes this invocation.
    pub reroutes_demands: u64,
    /// Cumulative output-level (port) reroutes this invocation.
    pub reroutes_outputs: u64,
    /// Demands covered by a live lock.
    pub locked_demands: u32,
    /// Output ports covered by a live lock on their demand.
    pub locked_outputs: u32,
    /// Ports with a non-zero owner after this commit.
    pub routes_active: u32,
    /// Ports whose spine is unchanged from before this commit.
    pub routes_preserved: u32,
    /// Ports connected for the first time.
    pub routes_new: u32,
    /// Ports disconnected by this commit.
    pub routes_removed: u32,
    /// Cumulative demand-level reroutes (alias of `reroutes_demands`).
    pub stability_reroutes: u64,
    /// `(initial_route_count - reroutes_demands) / initial_route_count`.
    pub stability_reuse_pct: f64,
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

/// Assembles the final report from the context's current state and the most
/// recent repack's metrics. `last` is `None` when no command ever repacked
/// successfully (e.g. an empty route file); the report then describes the
/// trivial all-empty fabric with zero solve time.
#[must_use]
pub fn build_report(
    ctx: &FabricContext,
    last: Option<&RepackReport>,
    lock_conflicts: &[LockConflict],
) -> FabricReport {
    let n = ctx.n;
    let max_ports = ctx.n * ctx.n;
    let default_metrics = crate::metrics::CommitMetrics::default();
    let metrics = last.map_or(&default_metrics, |r| &r.metrics);
    let solve_ms = last.map_or(0.0, |r| r.solve_ms);

    let mut s1_to_s2 = vec![vec![0i64; n as usize]; n as usize];
    let mut s2_to_s3 = vec![vec![0i64; n as usize]; n as usize];
    for block in 0..n as usize {
        for spine in 0..n as usize {
            s1_to_s2[block][spine] = ctx
                .committed
                .stage1_owner(crate::ident::BlockId(block), SpineId(spine))
                .map_or(0, |i| i64::from(i.get()));
            s2_to_s3[spine][block] = ctx
                .committed
                .stage2_owner(SpineId(spine), crate::ident::BlockId(block))
                .map_or(0, |i| i64::from(i.get()));
        }
    }

    let mut s3_port_owner = vec![0i64; (max_ports + 1) as usize];
    let mut s3_port_spine = vec![-1i64; (max_ports + 1) as usize];
    let mut desired_owner = vec![0i64; (max_ports + 1) as usize];
    for raw in 1..=max_ports {
        let port = PortId::new(raw).expect("raw ranges over 1..=max_ports");
        if let Some(owner) = ctx.committed.port_owner(port) {
            s3_port_owner[raw as usize] = i64::from(owner.get());
        }
        if let Some(spine) = ctx.committed.port_spine(port) {
            s3_port_spine[raw as usize] = spine.0 as i64;
        }
        if let Some(owner) = ctx.desired.owner_of(port) {
            desired_owner[raw as usize] = i64::from(owner.get());
        }
    }

    FabricReport {
        version: 1,
        n,
        total_blocks: n,
        max_ports,
        s1_to_s2,
        s2_to_s3,
        s3_port_owner,
        s3_port_spine,
        desired_owner,
        stability_changes: metrics.stability_changes,
        strict_stability: ctx.strict_stability,
        lock_conflicts: lock_conflicts.iter().map(LockConflictJson::from).collect(),
        solve_ms,
        solve_total_ms: ctx.counters.solve_total_ms,
        repack_count: ctx.counters.repack_count,
        reroutes_demands: ctx.counters.reroutes_demands,
        reroutes_outputs: ctx.counters.reroutes_outputs,
        locked_demands: metrics.locked_demands,
        locked_outputs: metrics.locked_outputs,
        routes_active: metrics.routes_active,
        routes_preserved: metrics.routes_preserved,
        routes_new: metrics.routes_new,
        routes_removed: metrics.routes_removed,
        stability_reroutes: ctx.counters.reroutes_demands,
        stability_reuse_pct: crate::metrics::CommitMetrics::stability_reuse_pct(&ctx.counters),
        inputs_with_mult: metrics.inputs_with_mult,
        inputs_multi_spine: metrics.inputs_multi_spine,
        egress_with_mult: metrics.egress_with_mult,
        max_egress_load: metrics.max_egress_load,
        active_spines: metrics.active_spines,
        total_branches: metrics.total_branches,
    }
}

/// Reads a previous-state JSON document, extracting only `s3_port_spine`;
/// every other field is tolerated and ignored.
pub fn parse_previous_state(text: &str) -> Result<PreviousState, serde_json::Error> {
    #[derive(Deserialize)]
    struct Raw {
        s3_port_spine: Vec<i64>,
    }
    let raw: Raw = serde_json::from_str(text)?;
    let mut map = BTreeMap::new();
    for (raw_port, spine) in raw.s3_port_spine.into_iter().enumerate() {
        let Some(port) = PortId::new(raw_port as u32) else {
            continue; // index 0 is the unused slot
        };
        if spine >= 0 {
            map.insert(port, SpineId(spine as usize));
        }
    }
    Ok(PreviousState::from_map(map))
}

/// Reads a locks JSON document: a list of `{"input", "egressBlock"|"egress",
/// "spine"}` records. Unknown keys on a record are ignored. The document itself
/// must be a JSON array — a failure to parse that shape at all is fatal, since
/// there is no array of records to salvage anything from. Within the array,
/// each element is deserialized independently: one element this lenient record
/// shape cannot make sense of (a missing field, or a field of the wrong type)
/// is flagged as a `RANGE` conflict and dropped, rather than failing every
/// other, well-formed record in the same file.
pub fn parse_locks(text: &str) -> Result<(Vec<RawLock>, Vec<LockConflict>), serde_json::Error> {
    #[derive(Deserialize)]
    struct Raw {
        input: i64,
        #[serde(alias = "egress", alias = "egressBlock")]
        egress_block: i64,
        spine: i64,
    }

    let values: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let mut raw_locks = Vec::with_capacity(values.len());
    let mut conflicts = Vec::new();

    for value in values {
        match serde_json::from_value::<Raw>(value.clone()) {
            Ok(r) => raw_locks.push(RawLock {
                input: r.input,
                egress_block: r.egress_block,
                spine: r.spine,
            }),
            Err(_) => conflicts.push(LockConflict {
                input: value.get("input").and_then(serde_json::Value::as_i64).unwrap_or(-1),
                egress_block: value
                    .get("egress")
                    .or_else(|| value.get("egressBlock"))
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(-1),
                spine: value.get("spine").and_then(serde_json::Value::as_i64).unwrap_or(-1),
                reason: LockConflictReason::Range,
            }),
        }
    }

    Ok((raw_locks, conflicts))
}
