use super::*;

#[test]
fn fake_clock_advances_both_views() {
    let clock = FakeClock::new();
    let start_instant = clock.now();
    let start_ms = clock.epoch_ms();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - start_instant, Duration::from_secs(90));
    assert_eq!(clock.epoch_ms() - start_ms, 90_000);
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
