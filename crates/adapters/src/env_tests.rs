use super::*;
use serial_test::serial;

#[test]
#[serial]
fn missing_vars_take_defaults() {
    std::env::remove_var("MINDER_TEST_MISSING");
    assert_eq!(u64_or("MINDER_TEST_MISSING", 15), 15);
    assert!(bool_or("MINDER_TEST_MISSING", true));
    assert_eq!(minutes_or("MINDER_TEST_MISSING", 10), Duration::from_secs(600));
}

#[test]
#[serial]
fn set_vars_parse() {
    std::env::set_var("MINDER_TEST_SET", "42");
    assert_eq!(u64_or("MINDER_TEST_SET", 0), 42);
    std::env::set_var("MINDER_TEST_SET", "0.25");
    assert!((f64_or("MINDER_TEST_SET", 0.0) - 0.25).abs() < 1e-9);
    std::env::remove_var("MINDER_TEST_SET");
}

#[test]
#[serial]
fn bool_parsing_is_permissive() {
    for truthy in ["1", "true", "YES", "on"] {
        std::env::set_var("MINDER_TEST_BOOL", truthy);
        assert!(bool_or("MINDER_TEST_BOOL", false), "{truthy} is truthy");
    }
    std::env::set_var("MINDER_TEST_BOOL", "off");
    assert!(!bool_or("MINDER_TEST_BOOL", true));
    std::env::remove_var("MINDER_TEST_BOOL");
}

#[test]
#[serial]
fn hours_wrap() {
    std::env::set_var("MINDER_TEST_HOUR", "25");
    assert_eq!(hour_or("MINDER_TEST_HOUR", 0), 1);
    std::env::remove_var("MINDER_TEST_HOUR");
}

#[test]
#[serial]
fn empty_string_is_missing() {
    std::env::set_var("MINDER_TEST_EMPTY", "");
    assert_eq!(string("MINDER_TEST_EMPTY"), None);
    std::env::remove_var("MINDER_TEST_EMPTY");
}
