use super::*;

#[test]
fn manual_scheduler_fires_in_request_order() {
    let mut s = ManualScheduler::new();
    let a = s.request_frame();
    let b = s.request_frame();
    assert_ne!(a, b);
    assert_eq!(s.fire(), Some(a));
    assert_eq!(s.fire(), Some(b));
    assert_eq!(s.fire(), None);
    assert_eq!(s.requests(), 2);
}

#[test]
fn manual_cancel_only_counts_pending_handles() {
    let mut s = ManualScheduler::new();
    let a = s.request_frame();
    s.cancel_frame(a);
    s.cancel_frame(a);
    s.cancel_frame(TickHandle(999));
    assert_eq!(s.cancellations(), 1);
    assert!(s.pending().is_empty());
}

#[test]
fn interval_scheduler_paces_ticks() {
    let mut s = IntervalScheduler::new(200.0).unwrap();
    assert_eq!(s.interval(), Duration::from_millis(5));

    let h1 = s.request_frame();
    let (got, t1) = s.wait_next().unwrap();
    assert_eq!(got, h1);

    s.request_frame();
    let (_, t2) = s.wait_next().unwrap();
    assert!(t2.duration_since(t1) >= Duration::from_millis(4));
}

#[test]
fn interval_scheduler_cancel_clears_pending() {
    let mut s = IntervalScheduler::new(30.0).unwrap();
    let h = s.request_frame();
    s.cancel_frame(h);
    assert!(s.wait_next().is_none());
}

#[test]
fn interval_scheduler_rejects_bad_fps() {
    assert!(IntervalScheduler::new(0.0).is_err());
    assert!(IntervalScheduler::new(f64::INFINITY).is_err());
}
