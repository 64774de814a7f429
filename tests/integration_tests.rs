use chanhub_core::prelude::{Backend, MockBackend};
use chanhub_pipeline::prelude::HandlerRegistry;
use chanhub_web_generic::{raw_request_from, Headers, WebhookProcessor};
use std::sync::Arc;

fn processor() -> WebhookProcessor {
    WebhookProcessor::new(Arc::new(MockBackend::new()) as Arc<dyn Backend>, HandlerRegistry::new())
}

#[tokio::test]
async fn unknown_channel_type_is_404() {
    let processor = processor();
    let headers: Headers = vec![];
    let response = processor
        .process(
            "unknown",
            "11111111-1111-1111-1111-111111111111",
            "receive",
            "https://example.test/c/unknown/11111111-1111-1111-1111-111111111111/receive",
            &headers,
            raw_request_from(None, b"test payload"),
        )
        .await;

    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn empty_payload_against_unregistered_type_is_404() {
    let processor = processor();
    let headers: Headers = vec![("content-type".to_string(), "application/json".to_string())];
    let response = processor
        .process(
            "t",
            "11111111-1111-1111-1111-111111111111",
            "receive",
            "https://example.test/c/t/11111111-1111-1111-1111-111111111111/receive",
            &headers,
            raw_request_from(Some("application/json"), b""),
        )
        .await;

    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn malformed_channel_uuid_is_404() {
    let processor = processor();
    let headers: Headers = vec![];
    let response = processor
        .process(
            "t",
            "not-a-uuid",
            "receive",
            "https://example.test/c/t/not-a-uuid/receive",
            &headers,
            raw_request_from(None, b"{}"),
        )
        .await;

    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn large_payload_against_unregistered_type_is_handled() {
    let processor = processor();
    let large_payload = "x".repeat(10_000);
    let headers: Headers = vec![("content-type".to_string(), "application/json".to_string())];

    let response = processor
        .process(
            "t",
            "11111111-1111-1111-1111-111111111111",
            "receive",
            "https://example.test/c/t/11111111-1111-1111-1111-111111111111/receive",
            &headers,
            raw_request_from(Some("application/json"), large_payload.as_bytes()),
        )
        .await;

    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn concurrent_webhooks_against_unregistered_type_all_complete() {
    let processor = processor();

    let futures = (0..10).map(|i| {
        let processor = processor.clone();
        async move {
            let headers: Headers = vec![("content-type".to_string(), "application/json".to_string())];
            let payload = format!(r#"{{"index":{i}}}"#);
            processor
                .process(
                    "t",
                    "11111111-1111-1111-1111-111111111111",
                    "receive",
                    "https://example.test/c/t/11111111-1111-1111-1111-111111111111/receive",
                    &headers,
                    raw_request_from(Some("application/json"), payload.as_bytes()),
                )
                .await
        }
    });

    let responses = futures::future::join_all(futures).await;
    assert_eq!(responses.len(), 10);
    for response in responses {
        assert_eq!(response.status, 404);
    }
}

#[tokio::test]
async fn unicode_headers_do_not_panic_the_pipeline() {
    let processor = processor();
    let headers: Headers = vec![
        ("x-unicode-header".to_string(), "测试数据".to_string()),
        ("content-type".to_string(), "application/json; charset=utf-8".to_string()),
    ];
    let response = processor
        .process(
            "t",
            "11111111-1111-1111-1111-111111111111",
            "receive",
            "https://example.test/c/t/11111111-1111-1111-1111-111111111111/receive",
            &headers,
            raw_request_from(Some("application/json"), "测试".as_bytes()),
        )
        .await;

    assert_eq!(response.status, 404);
}
