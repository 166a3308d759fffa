//! Checks the committed-state invariants (I1-I4) and the idempotence /
//! clear-route-inverse laws end to end through `FabricContext`.

use fabric_core::{FabricContext, InputId, PortId, PreviousState};

fn ports(raw: &[u32]) -> Vec<PortId> {
    raw.iter().map(|&p| PortId::new(p).unwrap()).collect()
}

fn fresh_ctx(n: u32) -> FabricContext {
    let (locks, _) = fabric_core::locks::load_locks(&[], n);
    FabricContext::new(n, false, PreviousState::default(), locks)
}

fn check_invariants(ctx: &FabricContext) {
    let n = ctx.n;
    for raw in 1..=(n * n) {
        let port = PortId::new(raw).unwrap();
        let desired_owner = ctx.desired.owner_of(port);
        let committed_owner = ctx.committed.port_owner(port);
        assert_eq!(committed_owner, desired_owner, "I3 failed for port {raw}");

        match (committed_owner, ctx.committed.port_spine(port)) {
            (Some(owner), Some(spine)) => {
                let egress_block = port.block(n);
                assert_eq!(
                    ctx.committed.stage2_owner(spine, egress_block),
                    Some(owner),
                    "I2 failed for port {raw}"
                );
                let ingress_block = owner.block(n);
                assert_eq!(
                    ctx.committed.stage1_owner(ingress_block, spine),
                    Some(owner),
                    "I1 failed for port {raw}"
                );
            }
            (None, None) => {}
            other => panic!("port {raw}: owner/spine pairing inconsistent: {other:?}"),
        }
    }
}

#[test]
fn invariants_hold_after_a_sequence_of_routes_and_clears() {
    let mut ctx = fresh_ctx(10);
    ctx.apply_route(InputId::new(1).unwrap(), &ports(&[11, 12, 13]), |_| {})
        .unwrap();
    check_invariants(&ctx);
    ctx.apply_route(InputId::new(2).unwrap(), &ports(&[21]), |_| {})
        .unwrap();
    check_invariants(&ctx);
    ctx.apply_clear(InputId::new(1).unwrap(), |_| {}).unwrap();
    check_invariants(&ctx);
}

#[test]
fn empty_desired_state_is_trivially_satisfied() {
    let ctx = fresh_ctx(4);
    check_invariants(&ctx);
    for raw in 1..=16 {
        let port = PortId::new(raw).unwrap();
        assert_eq!(ctx.committed.port_owner(port), None);
        assert_eq!(ctx.committed.port_spine(port), None);
    }
}

#[test]
fn idempotent_route_request_leaves_the_committed_state_unchanged() {
    let mut ctx = fresh_ctx(10);
    ctx.apply_route(InputId::new(1).unwrap(), &ports(&[11, 12]), |_| {})
        .unwrap();
    let before = ctx.committed.clone();

    let report = ctx
        .apply_route(InputId::new(1).unwrap(), &ports(&[11, 12]), |_| {})
        .expect("reissuing the same route request must still succeed");

    assert_eq!(ctx.committed, before);
    assert_eq!(report.metrics.stability_changes, 0);
}

#[test]
fn clearing_right_after_a_route_restores_the_pre_route_desired_state() {
    let mut ctx = fresh_ctx(10);
    ctx.apply_route(InputId::new(2).unwrap(), &ports(&[21]), |_| {})
        .unwrap();
    let pre_route_desired = ctx.desired.clone();

    ctx.apply_route(InputId::new(1).unwrap(), &ports(&[11, 12]), |_| {})
        .unwrap();
    ctx.apply_clear(InputId::new(1).unwrap(), |_| {}).unwrap();

    assert_eq!(ctx.desired, pre_route_desired);
    check_invariants(&ctx);
}

#[test]
fn single_input_with_n_outputs_in_distinct_blocks_reuses_one_spine() {
    let n = 5;
    let mut ctx = fresh_ctx(n);
    let outputs: Vec<u32> = (0..n).map(|block| block * n + 1).collect();
    let report = ctx
        .apply_route(InputId::new(1).unwrap(), &ports(&outputs), |_| {})
        .expect("one input reaching every egress block exactly once must be satisfiable");
    assert_eq!(report.metrics.total_branches, 1);
    assert_eq!(report.metrics.routes_active, n);
}

#[test]
fn n_distinct_inputs_from_one_block_saturating_every_egress_block_still_solves() {
    let n = 4;
    let mut ctx = fresh_ctx(n);
    for input in 1..=n {
        let outputs: Vec<u32> = (0..n).map(|block| block * n + input).collect();
        ctx.apply_route(InputId::new(input).unwrap(), &ports(&outputs), |_| {})
            .expect("saturating ingress capacity exactly must still be feasible");
    }
    check_invariants(&ctx);
}
