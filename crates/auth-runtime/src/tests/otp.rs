//! OTP request and verification flows.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_storage::{StorageAdapter, StorageKeys};
use auth_transport::ApiError;

use super::harness::{auth_body, runtime_against, sample_user, signed_in_runtime};
use crate::{AuthError, OtpDelivery};

#[tokio::test]
async fn request_otp_sends_identifier_and_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/request-otp"))
        .and(body_partial_json(json!({
            "identifier": "doc@example.com",
            "deliveryMethod": "sms",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "message": "OTP sent"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (runtime, _storage) = runtime_against(&server);

    let ack = runtime
        .request_otp("doc@example.com", OtpDelivery::Sms)
        .await
        .unwrap();
    assert!(ack.success);
    assert_eq!(ack.message, "OTP sent");
}

#[tokio::test]
async fn verify_otp_authenticates_and_creates_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-otp"))
        .and(body_partial_json(json!({
            "email": "doc@example.com",
            "otp": "123456",
            "type": "login",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("at-o", "rt-o")))
        .mount(&server)
        .await;
    let (runtime, storage) = runtime_against(&server);

    let user = runtime.verify_otp("doc@example.com", "123456").await.unwrap();
    assert_eq!(user.id, "u-100");

    assert!(runtime.state().is_authenticated);
    assert_eq!(
        storage.get(StorageKeys::ACCESS_TOKEN).unwrap().as_deref(),
        Some("at-o")
    );
    assert!(runtime.sessions().current_session().is_some());
}

#[tokio::test]
async fn verify_otp_missing_tokens_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-otp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": sample_user()})))
        .mount(&server)
        .await;
    let (runtime, storage) = runtime_against(&server);

    let err = runtime
        .verify_otp("doc@example.com", "123456")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Api(ApiError::InvalidResponse { .. })
    ));

    let state = runtime.state();
    assert!(!state.is_authenticated);
    assert_eq!(state.error.as_deref(), Some("Invalid response from server"));
    assert_eq!(storage.get(StorageKeys::ACCESS_TOKEN).unwrap(), None);
    assert_eq!(storage.get(StorageKeys::AUTH_STATE).unwrap(), None);
}

#[tokio::test]
async fn verify_otp_empty_tokens_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-otp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("", "")))
        .mount(&server)
        .await;
    let (runtime, storage) = runtime_against(&server);

    let err = runtime
        .verify_otp("doc@example.com", "123456")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Api(ApiError::InvalidResponse { .. })
    ));
    assert!(!runtime.state().is_authenticated);
    assert_eq!(storage.get(StorageKeys::ACCESS_TOKEN).unwrap(), None);
}

#[tokio::test]
async fn wrong_code_maps_to_invalid_otp() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-otp"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid OTP"})))
        .mount(&server)
        .await;
    let (runtime, _storage) = runtime_against(&server);

    let err = runtime
        .verify_otp("doc@example.com", "000000")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::InvalidOtp)));
    assert_eq!(
        runtime.state().error.as_deref(),
        Some("Invalid OTP. Please try again.")
    );
}

#[tokio::test]
async fn failed_otp_on_signed_in_runtime_clears_session() {
    let server = MockServer::start().await;
    let (runtime, storage) = signed_in_runtime(&server).await;
    assert!(runtime.sessions().current_session().is_some());

    Mock::given(method("POST"))
        .and(path("/auth/verify-otp"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid OTP"})))
        .mount(&server)
        .await;

    runtime
        .verify_otp("doc@example.com", "000000")
        .await
        .unwrap_err();

    assert!(!runtime.state().is_authenticated);
    assert!(runtime.sessions().current_session().is_none());
    assert_eq!(storage.get(StorageKeys::SESSION_INFO).unwrap(), None);
    assert_eq!(storage.get(StorageKeys::ACCESS_TOKEN).unwrap(), None);
}

#[tokio::test]
async fn otp_status_and_invalidation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/check-otp-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hasActiveOTP": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/invalidate-otp"))
        .and(body_partial_json(json!({"identifier": "doc@example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    let (runtime, _storage) = runtime_against(&server);

    assert!(runtime.check_otp_status("doc@example.com").await.unwrap());
    runtime.invalidate_otp("doc@example.com").await.unwrap();
    assert!(!runtime.state().loading);
}
