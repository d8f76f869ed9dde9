use std::time::Duration;

use mockito::Matcher;
use serde_json::json;

use mailbridge::config::ServiceConfig;
use mailbridge::normalize::Message;
use mailbridge::reply::ReplyResolver;
use mailbridge::upstream::UpstreamClient;

fn test_config(base_url: &str) -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        client_id: Some("test-client".to_string()),
        client_secret: Some("test-secret".to_string()),
        default_user_id: "demo-email-user".to_string(),
        email_api_base_url: base_url.trim_end_matches('/').to_string(),
        cors_allow_origin: "*".to_string(),
        upstream_timeout: Duration::from_secs(5),
    }
}

fn resolver(base_url: &str) -> ReplyResolver {
    ReplyResolver::new(UpstreamClient::new(&test_config(base_url)).expect("client"))
}

fn message(id: &str, thread_id: Option<&str>, subject: &str) -> Message {
    Message {
        id: id.to_string(),
        thread_id: thread_id.map(str::to_string),
        subject: subject.to_string(),
        from: "Jane Doe <jane@example.com>".to_string(),
        from_email: "jane@example.com".to_string(),
        snippet: String::new(),
        received_at: String::new(),
        body: String::new(),
    }
}

#[tokio::test]
async fn existing_thread_id_needs_no_network_call() {
    let mut server = mockito::Server::new_async().await;
    let untouched = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let target = resolver(&server.url())
        .resolve_reply_target(&message("m-1", Some("t-1"), "Hello"), "cred-1")
        .await;

    assert_eq!(target.to, "jane@example.com");
    assert_eq!(target.subject, "Re: Hello");
    assert_eq!(target.thread_id.as_deref(), Some("t-1"));
    untouched.assert_async().await;
}

#[tokio::test]
async fn thread_id_is_hydrated_from_message_detail() {
    let mut server = mockito::Server::new_async().await;
    let detail = server
        .mock("GET", "/emailMessages/m-1")
        .match_header("x-rollout-credential-id", "cred-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "m-1", "threadId": "t-9" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let target = resolver(&server.url())
        .resolve_reply_target(&message("m-1", None, "Re: Hello"), "cred-1")
        .await;

    assert_eq!(target.thread_id.as_deref(), Some("t-9"));
    // Prefix is not duplicated.
    assert_eq!(target.subject, "Re: Hello");
    detail.assert_async().await;
}

#[tokio::test]
async fn missing_thread_is_created_with_original_subject() {
    let mut server = mockito::Server::new_async().await;
    let detail = server
        .mock("GET", "/emailMessages/m-1")
        .with_status(404)
        .with_body(json!({ "error": "not found" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let created = server
        .mock("POST", "/email-threads")
        .match_body(Matcher::PartialJson(json!({ "subject": "Hello" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "t-new" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let target = resolver(&server.url())
        .resolve_reply_target(&message("m-1", None, "Hello"), "cred-1")
        .await;

    assert_eq!(target.thread_id.as_deref(), Some("t-new"));
    detail.assert_async().await;
    created.assert_async().await;
}

#[tokio::test]
async fn all_fallbacks_failing_still_yields_a_reply_target() {
    let mut server = mockito::Server::new_async().await;
    let _detail = server
        .mock("GET", "/emailMessages/m-1")
        .with_status(500)
        .create_async()
        .await;
    let _thread = server
        .mock("POST", "/email-threads")
        .with_status(500)
        .create_async()
        .await;

    let target = resolver(&server.url())
        .resolve_reply_target(&message("m-1", None, ""), "cred-1")
        .await;

    // Un-threaded reply proceeds; recipient and subject are still usable.
    assert!(target.thread_id.is_none());
    assert_eq!(target.to, "jane@example.com");
    assert_eq!(target.subject, "Re: ");
}
