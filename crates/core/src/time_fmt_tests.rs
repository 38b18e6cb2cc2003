use super::*;
use yare::parameterized;

#[parameterized(
    seconds = { 45_000, "45s" },
    minutes = { 12 * 60_000, "12m" },
    hours = { 3 * 3_600_000, "3h" },
    days = { 5 * 86_400_000, "5d" },
    zero = { 0, "0s" },
    rounds_down = { 119_000, "1m" },
)]
fn formats_largest_unit(ms: u64, expected: &str) {
    assert_eq!(format_elapsed_ms(ms), expected);
}

#[test]
fn since_saturates() {
    assert_eq!(format_since(1_000, 5_000), "0s");
    assert_eq!(format_since(50 * 3_600_000, 0), "2d");
}
