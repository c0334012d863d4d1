//! Authentication state.

use serde::{Deserialize, Serialize};

use auth_transport::User;

/// Access and refresh token pair. Both are opaque to the client; only
/// presence and expiry-driven replacement matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The single authoritative authentication state.
///
/// Mutated exclusively by [`AuthRuntime`](crate::AuthRuntime); everyone
/// else observes it through snapshots and subscriptions. The serialized
/// form is the rehydration snapshot persisted under the aggregate
/// storage key; `loading` and `error` are per-process and never persist.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Flattened so the snapshot carries plain `accessToken` /
    /// `refreshToken` fields, matching the individual storage keys.
    #[serde(flatten)]
    pub tokens: Option<TokenPair>,
    #[serde(skip)]
    pub loading: bool,
    #[serde(skip)]
    pub error: Option<String>,
}

impl AuthState {
    /// The held access token, when authenticated.
    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    /// The held refresh token, when authenticated.
    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }

    pub(crate) fn authenticated(user: User, tokens: TokenPair) -> Self {
        Self {
            is_authenticated: true,
            user: Some(user),
            tokens: Some(tokens),
            loading: false,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_transport::Role;
    use chrono::{TimeZone, Utc};

    fn sample_user() -> User {
        User {
            id: "u-1".to_string(),
            email: "doc@example.com".to_string(),
            first_name: "Dana".to_string(),
            last_name: "Osei".to_string(),
            phone_number: None,
            role: Role::Doctor,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn snapshot_serializes_flat_token_fields() {
        let state = AuthState::authenticated(
            sample_user(),
            TokenPair {
                access_token: "at".to_string(),
                refresh_token: "rt".to_string(),
            },
        );

        let json: serde_json::Value = serde_json::from_str(
            &serde_json::to_string(&state).unwrap(),
        )
        .unwrap();

        assert_eq!(json["isAuthenticated"], true);
        assert_eq!(json["accessToken"], "at");
        assert_eq!(json["refreshToken"], "rt");
        assert_eq!(json["user"]["firstName"], "Dana");
        assert!(json.get("loading").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn snapshot_without_tokens_deserializes_to_none() {
        let state: AuthState = serde_json::from_str(r#"{"isAuthenticated":false}"#).unwrap();
        assert!(!state.is_authenticated);
        assert_eq!(state.tokens, None);
        assert_eq!(state.access_token(), None);
    }

    #[test]
    fn snapshot_round_trips() {
        let state = AuthState::authenticated(
            sample_user(),
            TokenPair {
                access_token: "at".to_string(),
                refresh_token: "rt".to_string(),
            },
        );
        let back: AuthState = serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(back, state);
    }
}
