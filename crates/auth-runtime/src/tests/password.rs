//! Forgotten-password flows.

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::harness::runtime_against;

#[tokio::test]
async fn forgot_password_returns_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/forgot-password"))
        .and(body_json(json!({"email": "doc@example.com"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Reset email sent"})),
        )
        .mount(&server)
        .await;
    let (runtime, _storage) = runtime_against(&server);

    let response = runtime.forgot_password("doc@example.com").await.unwrap();
    assert_eq!(response.message, "Reset email sent");
    assert!(!runtime.state().is_authenticated);
}

#[tokio::test]
async fn reset_password_posts_token_and_new_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/reset-password"))
        .and(body_json(json!({
            "token": "reset-tok",
            "newPassword": "N3w!passw0rd",
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Password updated"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (runtime, _storage) = runtime_against(&server);

    let response = runtime
        .reset_password("reset-tok", "N3w!passw0rd")
        .await
        .unwrap();
    assert_eq!(response.message, "Password updated");
}

#[tokio::test]
async fn reset_with_expired_token_surfaces_validation_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/reset-password"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Reset token expired"})),
        )
        .mount(&server)
        .await;
    let (runtime, _storage) = runtime_against(&server);

    let err = runtime
        .reset_password("stale-tok", "N3w!passw0rd")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Reset token expired");
    assert_eq!(runtime.state().error.as_deref(), Some("Reset token expired"));
}
