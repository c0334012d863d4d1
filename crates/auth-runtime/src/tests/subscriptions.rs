//! Subscriber fan-out and ordering.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::harness::{runtime_against, signed_in_runtime, stub_login};

#[tokio::test]
async fn operation_states_arrive_in_order() {
    let server = MockServer::start().await;
    stub_login(&server, "at-1", "rt-1").await;
    let (runtime, _storage) = runtime_against(&server);

    let mut sub = runtime.subscribe();
    let initial = sub.try_recv().unwrap();
    assert!(!initial.is_authenticated);
    assert!(!initial.loading);

    runtime
        .login("doc@example.com", "Str0ng!pass")
        .await
        .unwrap();

    let started = sub.try_recv().unwrap();
    assert!(started.loading);
    assert!(!started.is_authenticated);

    let settled = sub.try_recv().unwrap();
    assert!(!settled.loading);
    assert!(settled.is_authenticated);

    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn dropped_subscribers_are_pruned() {
    let server = MockServer::start().await;
    stub_login(&server, "at-1", "rt-1").await;
    let (runtime, _storage) = runtime_against(&server);

    let sub_a = runtime.subscribe();
    let sub_b = runtime.subscribe();
    let sub_c = runtime.subscribe();
    assert_eq!(runtime.subscriber_count(), 3);

    drop(sub_a);
    drop(sub_b);
    drop(sub_c);

    // The next mutation notices every receiver is gone.
    runtime
        .login("doc@example.com", "Str0ng!pass")
        .await
        .unwrap();
    assert_eq!(runtime.subscriber_count(), 0);
}

#[tokio::test]
async fn late_subscriber_sees_current_state_immediately() {
    let server = MockServer::start().await;
    let (runtime, _storage) = signed_in_runtime(&server).await;

    let mut sub = runtime.subscribe();
    let snapshot = sub.try_recv().unwrap();
    assert!(snapshot.is_authenticated);
    assert_eq!(snapshot.access_token(), Some("at-1"));
}

#[tokio::test]
async fn failure_notifies_error_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "nope"})))
        .mount(&server)
        .await;
    let (runtime, _storage) = runtime_against(&server);

    let mut sub = runtime.subscribe();
    let _ = sub.try_recv();

    let _ = runtime.login("doc@example.com", "wrong").await;

    let started = sub.try_recv().unwrap();
    assert!(started.loading);
    assert_eq!(started.error, None);

    let failed = sub.try_recv().unwrap();
    assert!(!failed.loading);
    assert_eq!(failed.error.as_deref(), Some("Invalid email or password"));
    assert!(!failed.is_authenticated);
}
