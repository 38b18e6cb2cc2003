use super::*;
use yare::parameterized;

#[parameterized(
    reset = { "ECONNRESET while reading", ErrorClass::Transient },
    refused = { "connect: connection refused", ErrorClass::Transient },
    hangup = { "socket hang up", ErrorClass::Transient },
    timeout = { "request timed out", ErrorClass::Transient },
    not_found = { "model not found", ErrorClass::PermanentInput },
    unauthorized = { "401 Unauthorized", ErrorClass::PermanentInput },
    logged_out = { "client is logged out", ErrorClass::PermanentInput },
    other = { "something odd happened", ErrorClass::Internal },
)]
fn message_classification(message: &str, expected: ErrorClass) {
    assert_eq!(classify_message(message), expected);
}

#[test]
fn backend_errors_classify_by_transience() {
    use minder_adapters::BackendError;
    use std::time::Duration;

    let transient = CycleError::Backend(BackendError::Timeout(Duration::from_secs(1)));
    assert_eq!(transient.class(), ErrorClass::Transient);

    let permanent = CycleError::Backend(BackendError::Unauthorized("401".into()));
    assert_eq!(permanent.class(), ErrorClass::PermanentInput);
}
