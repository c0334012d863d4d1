//! Shared fixtures: a mock auth server and runtimes wired against it.

use std::sync::Arc;

use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_storage::MemoryStorage;

use crate::{AuthRuntime, RuntimeConfig};

pub fn sample_user() -> Value {
    json!({
        "id": "u-100",
        "email": "doc@example.com",
        "firstName": "Dana",
        "lastName": "Osei",
        "role": "DOCTOR",
        "createdAt": "2024-05-01T10:00:00Z",
        "updatedAt": "2024-06-01T10:00:00Z"
    })
}

pub fn auth_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "user": sample_user(),
    })
}

/// Aggregate snapshot in the shape a previous process would persist.
pub fn persisted_snapshot(access: &str, refresh: &str) -> String {
    json!({
        "isAuthenticated": true,
        "user": sample_user(),
        "accessToken": access,
        "refreshToken": refresh,
    })
    .to_string()
}

pub fn runtime_against(server: &MockServer) -> (AuthRuntime, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let runtime = runtime_with_storage(server, storage.clone());
    (runtime, storage)
}

pub fn runtime_with_storage(server: &MockServer, storage: Arc<MemoryStorage>) -> AuthRuntime {
    let base = Url::parse(&server.uri()).unwrap();
    AuthRuntime::new(RuntimeConfig::new(base, storage))
}

pub async fn stub_login(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(access, refresh)))
        .mount(server)
        .await;
}

/// A runtime already signed in through the stubbed login endpoint.
pub async fn signed_in_runtime(server: &MockServer) -> (AuthRuntime, Arc<MemoryStorage>) {
    stub_login(server, "at-1", "rt-1").await;
    let (runtime, storage) = runtime_against(server);
    runtime
        .login("doc@example.com", "Str0ng!pass")
        .await
        .unwrap();
    (runtime, storage)
}
