use super::*;

#[test]
fn endpoint_joins_without_double_slash() {
    let backend = OpenAiBackend::new(
        "local",
        "http://localhost:8080/",
        "qwen",
        None,
        BackendKind::Local,
    );
    assert_eq!(
        backend.endpoint("/v1/chat/completions"),
        "http://localhost:8080/v1/chat/completions"
    );
}

#[test]
fn response_shape_parses_with_and_without_usage() {
    let with: ChatCompletionResponse = serde_json::from_str(
        r#"{"choices":[{"message":{"content":"hi"}}],"usage":{"prompt_tokens":10,"completion_tokens":3}}"#,
    )
    .unwrap();
    assert_eq!(with.choices[0].message.content, "hi");
    assert_eq!(with.usage.as_ref().map(|u| u.prompt_tokens), Some(10));

    let without: ChatCompletionResponse =
        serde_json::from_str(r#"{"choices":[{"message":{"content":"hi"}}]}"#).unwrap();
    assert!(without.usage.is_none());
}

#[test]
fn transient_classification() {
    assert!(BackendError::Unavailable("refused".into()).is_transient());
    assert!(BackendError::Timeout(Duration::from_secs(1)).is_transient());
    assert!(!BackendError::Unauthorized("401".into()).is_transient());
    assert!(!BackendError::InvalidResponse("bad".into()).is_transient());
}

#[tokio::test]
async fn probe_fails_fast_when_nothing_listens() {
    // Port 9 (discard) is essentially never serving HTTP
    let backend = OpenAiBackend::new(
        "dead",
        "http://127.0.0.1:9",
        "none",
        None,
        BackendKind::Local,
    );
    assert!(!backend.probe().await);
}
