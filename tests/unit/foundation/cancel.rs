use super::*;

#[test]
fn clones_share_state() {
    let a = CancelToken::new();
    let b = a.clone();
    assert!(!b.is_cancelled());
    a.cancel();
    assert!(b.is_cancelled());
}

#[test]
fn wait_returns_early_on_cancel() {
    let token = CancelToken::new();
    let remote = token.clone();
    let started = Instant::now();
    let h = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        remote.cancel();
    });
    assert!(token.wait_timeout(Duration::from_secs(10)));
    assert!(started.elapsed() < Duration::from_secs(5));
    h.join().unwrap();
}

#[test]
fn wait_times_out_without_cancel() {
    let token = CancelToken::new();
    assert!(!token.wait_timeout(Duration::from_millis(5)));
}
