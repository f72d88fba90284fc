use mockito::Matcher;
use nextstep::chat::{ChatBackend, HttpChatBackend};
use serde_json::json;

#[tokio::test]
async fn posts_message_and_returns_response_field() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/chat")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "message": "What is AICTE?" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response": "AICTE regulates technical education in India."}"#)
        .create_async()
        .await;

    // Trailing slash on the server url is tolerated
    let backend = HttpChatBackend::new(&format!("{}/", server.url()), 5).unwrap();
    let reply = backend.send("What is AICTE?").await.expect("reply");

    assert_eq!(reply, "AICTE regulates technical education in India.");
    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_carries_server_error_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/v1/chat")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "Rate limit exceeded. Please try again in a moment."}"#)
        .create_async()
        .await;

    let backend = HttpChatBackend::new(&server.url(), 5).unwrap();
    let err = backend.send("hi").await.unwrap_err();

    assert_eq!(err.status, Some(429));
    assert_eq!(err.message, "Rate limit exceeded. Please try again in a moment.");
}

#[tokio::test]
async fn non_json_error_body_is_kept_verbatim() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/v1/chat")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let backend = HttpChatBackend::new(&server.url(), 5).unwrap();
    let err = backend.send("hi").await.unwrap_err();

    assert_eq!(err.status, Some(500));
    assert!(err.message.contains("upstream exploded"));
}

#[tokio::test]
async fn error_field_on_success_status_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/v1/chat")
        .with_status(200)
        .with_body(r#"{"error": "Payment required. Please add credits to continue."}"#)
        .create_async()
        .await;

    let backend = HttpChatBackend::new(&server.url(), 5).unwrap();
    let err = backend.send("hi").await.unwrap_err();
    assert!(err.message.starts_with("Payment required"));
}

#[tokio::test]
async fn truncated_body_is_an_error_not_an_empty_reply() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/v1/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_chunked_body(|w| {
            w.write_all(br#"{"response": "Start with"#)?;
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(br#" the NCS portal."}"#)
        })
        .create_async()
        .await;

    // Client deadline expires while the body is still streaming
    let backend = HttpChatBackend::new(&server.url(), 1).unwrap();
    let err = backend.send("hi").await.unwrap_err();
    assert!(err.message.starts_with("failed to read chat response") || err.status.is_none());
}

#[tokio::test]
async fn unreachable_server_has_no_status() {
    // Nothing listens on port 9 locally
    let backend = HttpChatBackend::new("http://127.0.0.1:9", 2).unwrap();
    let err = backend.send("hi").await.unwrap_err();
    assert_eq!(err.status, None);
    assert!(err.message.starts_with("chat request failed"));
}
