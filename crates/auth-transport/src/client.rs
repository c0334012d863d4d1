//! Auth API client.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::{extract_messages, ApiError, ApiResult};
use crate::types::{
    AuthResponse, LoginCredentials, MessageResponse, OtpRequest, OtpRequested, OtpStatus,
    PasswordReset, RegisterData, SocialProvider, TokenVerification, User,
};

/// Deadline applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a 401 should be reported for a given call.
#[derive(Clone, Copy)]
enum UnauthorizedAs {
    Credentials,
    Otp,
}

fn summarize_body(body: &str) -> String {
    // Auth rejection bodies can carry identifiers; log shape, not content.
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Client for the remote authentication API.
///
/// Holds the base URL, the request deadline, and the bearer credential
/// attached to every request while one is held. One instance serves the
/// whole process; cloning is not needed because the auth runtime owns it.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    bearer: RwLock<Option<String>>,
}

impl AuthClient {
    /// Create a client with the default 10s deadline.
    pub fn new(base_url: Url) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit deadline (tests use short ones).
    pub fn with_timeout(base_url: Url, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout,
            bearer: RwLock::new(None),
        }
    }

    /// Set or clear the bearer credential for subsequent requests.
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.bearer.write().expect("lock poisoned") = token;
    }

    /// Build the absolute URL for an endpoint path.
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match self.bearer.read().expect("lock poisoned").as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a prepared request and normalize the outcome.
    ///
    /// Success is strictly 200/201; everything else maps into the error
    /// taxonomy. The response body of a rejection is never logged
    /// verbatim.
    async fn dispatch(
        &self,
        request: RequestBuilder,
        unauthorized: UnauthorizedAs,
    ) -> ApiResult<(StatusCode, String)> {
        let request = self.apply_auth(request).timeout(self.timeout);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::warn!(error = %e, "auth API request timed out");
                ApiError::Timeout
            } else {
                tracing::error!(error = %e, "auth API unreachable");
                ApiError::ServiceUnavailable {
                    status: None,
                    detail: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::OK | StatusCode::CREATED => Ok((status, body)),
            StatusCode::UNAUTHORIZED => Err(match unauthorized {
                UnauthorizedAs::Credentials => ApiError::InvalidCredentials,
                UnauthorizedAs::Otp => ApiError::InvalidOtp,
            }),
            s if s.is_client_error() => {
                let messages = extract_messages(&body, "Request rejected by the auth service");
                tracing::warn!(status = %s, body_summary = %summarize_body(&body), "auth API rejected request");
                Err(ApiError::Validation {
                    status: Some(s.as_u16()),
                    messages,
                })
            }
            s if s.is_server_error() => {
                tracing::error!(status = %s, body_summary = %summarize_body(&body), "auth API failure");
                Err(ApiError::ServiceUnavailable {
                    status: Some(s.as_u16()),
                    detail: format!("status {s}"),
                })
            }
            s => {
                tracing::error!(status = %s, "unexpected auth API status");
                Err(ApiError::invalid_response(format!("unexpected status {s}")))
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, body: &str) -> ApiResult<T> {
        serde_json::from_str(body).map_err(|e| {
            tracing::error!(error = %e, body_summary = %summarize_body(body), "undecodable auth API payload");
            ApiError::invalid_response(e.to_string())
        })
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        unauthorized: UnauthorizedAs,
    ) -> ApiResult<T> {
        let request = self.http.post(self.endpoint(path)).json(body);
        let (_, body) = self.dispatch(request, unauthorized).await?;
        self.decode(&body)
    }

    /// POST where the caller only needs success/failure.
    async fn post_ack<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        unauthorized: UnauthorizedAs,
    ) -> ApiResult<()> {
        let request = self.http.post(self.endpoint(path)).json(body);
        self.dispatch(request, unauthorized).await?;
        Ok(())
    }

    /// Exchange credentials for a token pair.
    pub async fn login(&self, credentials: &LoginCredentials) -> ApiResult<AuthResponse> {
        tracing::debug!(email = %credentials.email, "logging in");
        self.post_json("/auth/login", credentials, UnauthorizedAs::Credentials)
            .await
    }

    /// Create an account. Does not authenticate; the server answers with
    /// the bare created account.
    pub async fn register(&self, data: &RegisterData) -> ApiResult<User> {
        tracing::debug!(email = %data.email, "registering account");
        self.post_json("/auth/register", data, UnauthorizedAs::Credentials)
            .await
    }

    /// Create an account together with its clinic. The clinic travels
    /// under the `appName` key the server expects.
    pub async fn register_with_clinic(
        &self,
        data: &RegisterData,
        clinic_name: &str,
    ) -> ApiResult<User> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RegisterWithClinicRequest<'a> {
            #[serde(flatten)]
            data: &'a RegisterData,
            app_name: &'a str,
        }

        tracing::debug!(email = %data.email, clinic = %clinic_name, "registering account with clinic");
        self.post_json(
            "/auth/register-with-clinic",
            &RegisterWithClinicRequest {
                data,
                app_name: clinic_name,
            },
            UnauthorizedAs::Credentials,
        )
        .await
    }

    /// Invalidate the server-side session. Body identifies which one.
    pub async fn logout(&self, session_id: Option<&str>, all_devices: bool) -> ApiResult<()> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct LogoutRequest<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            session_id: Option<&'a str>,
            all_devices: bool,
        }

        tracing::debug!(all_devices, "logging out");
        self.post_ack(
            "/auth/logout",
            &LogoutRequest {
                session_id,
                all_devices,
            },
            UnauthorizedAs::Credentials,
        )
        .await
    }

    /// Mint a fresh token pair from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<AuthResponse> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RefreshRequest<'a> {
            refresh_token: &'a str,
        }

        tracing::debug!("refreshing token pair");
        self.post_json(
            "/auth/refresh",
            &RefreshRequest { refresh_token },
            UnauthorizedAs::Credentials,
        )
        .await
    }

    /// Check whether the held bearer token is still valid.
    pub async fn verify_token(&self) -> ApiResult<TokenVerification> {
        let request = self.http.get(self.endpoint("/auth/verify"));
        let (_, body) = self.dispatch(request, UnauthorizedAs::Credentials).await?;
        self.decode(&body)
    }

    /// Start the forgotten-password flow.
    pub async fn forgot_password(&self, email: &str) -> ApiResult<MessageResponse> {
        #[derive(Serialize)]
        struct ForgotPasswordRequest<'a> {
            email: &'a str,
        }

        self.post_json(
            "/auth/forgot-password",
            &ForgotPasswordRequest { email },
            UnauthorizedAs::Credentials,
        )
        .await
    }

    /// Complete the forgotten-password flow with the emailed token.
    pub async fn reset_password(&self, reset: &PasswordReset) -> ApiResult<MessageResponse> {
        self.post_json("/auth/reset-password", reset, UnauthorizedAs::Credentials)
            .await
    }

    /// Ask the server to deliver a one-time passcode.
    pub async fn request_otp(&self, request: &OtpRequest) -> ApiResult<OtpRequested> {
        tracing::debug!(identifier = %request.identifier, "requesting OTP");
        self.post_json("/auth/request-otp", request, UnauthorizedAs::Otp)
            .await
    }

    /// Exchange a delivered passcode for a token pair.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<AuthResponse> {
        #[derive(Serialize)]
        struct VerifyOtpRequest<'a> {
            email: &'a str,
            otp: &'a str,
            #[serde(rename = "type")]
            kind: &'static str,
        }

        tracing::debug!(email = %email, "verifying OTP");
        self.post_json(
            "/auth/verify-otp",
            &VerifyOtpRequest {
                email,
                otp,
                kind: "login",
            },
            UnauthorizedAs::Otp,
        )
        .await
    }

    /// Whether an undelivered OTP is still pending for an identifier.
    pub async fn check_otp_status(&self, identifier: &str) -> ApiResult<OtpStatus> {
        #[derive(Serialize)]
        struct IdentifierRequest<'a> {
            identifier: &'a str,
        }

        self.post_json(
            "/auth/check-otp-status",
            &IdentifierRequest { identifier },
            UnauthorizedAs::Otp,
        )
        .await
    }

    /// Invalidate any pending OTP for an identifier.
    pub async fn invalidate_otp(&self, identifier: &str) -> ApiResult<()> {
        #[derive(Serialize)]
        struct IdentifierRequest<'a> {
            identifier: &'a str,
        }

        self.post_ack(
            "/auth/invalidate-otp",
            &IdentifierRequest { identifier },
            UnauthorizedAs::Otp,
        )
        .await
    }

    /// Ask the server to email a magic sign-in link.
    pub async fn request_magic_link(&self, email: &str) -> ApiResult<MessageResponse> {
        #[derive(Serialize)]
        struct MagicLinkRequest<'a> {
            email: &'a str,
        }

        self.post_json(
            "/auth/magic-link",
            &MagicLinkRequest { email },
            UnauthorizedAs::Credentials,
        )
        .await
    }

    /// Exchange a magic-link token for a token pair.
    pub async fn verify_magic_link(&self, token: &str) -> ApiResult<AuthResponse> {
        #[derive(Serialize)]
        struct VerifyMagicLinkRequest<'a> {
            token: &'a str,
        }

        self.post_json(
            "/auth/verify-magic-link",
            &VerifyMagicLinkRequest { token },
            UnauthorizedAs::Credentials,
        )
        .await
    }

    /// Exchange a provider-issued OAuth token for a token pair.
    pub async fn social_login(
        &self,
        provider: SocialProvider,
        token: &str,
    ) -> ApiResult<AuthResponse> {
        #[derive(Serialize)]
        struct SocialLoginRequest<'a> {
            token: &'a str,
        }

        tracing::debug!(provider = provider.as_str(), "social login");
        self.post_json(
            &format!("/auth/social/{}", provider.as_str()),
            &SocialLoginRequest { token },
            UnauthorizedAs::Credentials,
        )
        .await
    }
}
