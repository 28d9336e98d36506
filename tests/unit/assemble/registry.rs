use super::*;

#[test]
fn urls_are_unique_and_resolve_until_revoked() {
    let reg = ClipRegistry::new();
    let a = reg.register(Arc::from(&b"aaa"[..]), "video/webm", "webm", 1);
    let b = reg.register(Arc::from(&b"aaa"[..]), "video/webm", "webm", 1);
    assert_ne!(a.url(), b.url());
    assert!(a.url().starts_with("clip:stillmotion/"));
    assert!(a.url().ends_with(".webm"));
    assert_eq!(reg.live_count(), 2);

    assert!(a.revoke());
    assert!(!a.revoke());
    assert!(!a.is_live());
    assert!(a.resolve().is_none());
    assert!(reg.resolve(a.url()).is_none());

    assert!(b.is_live());
    let (bytes, ct) = reg.resolve(b.url()).unwrap();
    assert_eq!(&*bytes, b"aaa");
    assert_eq!(ct, "video/webm");
}

#[test]
fn dropping_a_handle_keeps_the_clip() {
    let reg = ClipRegistry::new();
    let url = reg
        .register(Arc::from(&b"x"[..]), "video/mp4", "mp4", 7)
        .url()
        .to_owned();
    assert!(reg.resolve(&url).is_some());
    assert!(reg.revoke(&url));
    assert_eq!(reg.live_count(), 0);
}

#[test]
fn handle_keeps_clip_alive_after_registry_is_dropped() {
    let h = ClipRegistry::new().register(Arc::from(&b"xy"[..]), "video/mp4", "mp4", 7);
    assert!(h.is_live());
    assert_eq!(h.resolve().as_deref(), Some(&b"xy"[..]));

    let other = h.clone();
    assert!(h.revoke());
    assert!(!other.is_live());
    assert!(other.resolve().is_none());
    assert!(!other.revoke());
}
