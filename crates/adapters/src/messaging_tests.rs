use super::*;

#[test]
fn category_labels_round_trip() {
    for category in [
        MessageCategory::Alerts,
        MessageCategory::Hattrick,
        MessageCategory::Daily,
    ] {
        assert_eq!(MessageCategory::parse(category.label()), Some(category));
    }
    assert_eq!(MessageCategory::parse("unknown"), None);
}

#[tokio::test]
async fn noop_messaging_reports_not_sent() {
    let messaging = NoOpMessaging;
    assert!(!messaging.send_to_group(MessageCategory::Daily, "hi").await);
}

#[tokio::test]
async fn fake_messaging_records_and_rejects() {
    let messaging = FakeMessaging::new();
    assert!(messaging.send_to_group(MessageCategory::Alerts, "a").await);

    messaging.set_reject(true);
    assert!(!messaging.send_to_group(MessageCategory::Daily, "b").await);

    let sent = messaging.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], (MessageCategory::Alerts, "a".to_string()));
}

#[tokio::test]
async fn http_messaging_fails_closed_when_unreachable() {
    let messaging = HttpMessaging::new("http://127.0.0.1:9", std::time::Duration::from_millis(300));
    assert!(!messaging.send_to_group(MessageCategory::Daily, "hi").await);
}
