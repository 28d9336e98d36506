use super::*;

#[test]
fn leases_count_up_and_down() {
    let ledger = ResourceLedger::new();
    let a = ledger.lease_surface();
    let b = ledger.lease_capture_session();
    let c = ledger.lease_surface();
    let st = ledger.stats();
    assert_eq!(st.surfaces_active, 2);
    assert_eq!(st.capture_sessions_active, 1);

    drop(a);
    drop(b);
    let st = ledger.stats();
    assert_eq!(st.surfaces_active, 1);
    assert_eq!(st.capture_sessions_active, 0);
    assert_eq!(st.surfaces_created, 2);
    assert_eq!(st.capture_sessions_created, 1);

    drop(c);
    assert_eq!(ledger.stats().surfaces_active, 0);
}

#[test]
fn clones_share_counters() {
    let ledger = ResourceLedger::new();
    let other = ledger.clone();
    let _lease = other.lease_surface();
    assert_eq!(ledger.stats().surfaces_active, 1);
}
