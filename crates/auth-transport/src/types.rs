//! Wire types for the auth API.
//!
//! Field naming follows the server contract: camelCase for user and
//! request fields, snake_case for the token fields of [`AuthResponse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Role assigned to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Doctor,
    Patient,
    ClinicAdmin,
    Receptionist,
}

/// Identity record for an authenticated account.
///
/// Immutable from the client's perspective except by re-fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload of every authenticating call (login, OTP verify, magic-link
/// verify, social login, refresh).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
    #[serde(
        rename = "redirectPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_path: Option<String>,
}

/// Login input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Registration input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub age: u8,
}

impl RegisterData {
    /// Checks the payload against the server's registration rules so
    /// obviously bad input fails before the wire call, with the same
    /// error shape a server rejection produces.
    pub fn validate(&self) -> ApiResult<()> {
        let mut messages = Vec::new();

        if !looks_like_email(&self.email) {
            messages.push("Please enter a valid email address".to_string());
        }
        if self.password.len() < 8 {
            messages.push("Password must be at least 8 characters".to_string());
        }
        if !self.password.chars().any(|c| c.is_ascii_uppercase()) {
            messages.push("Password must contain at least one uppercase letter".to_string());
        }
        if !self.password.chars().any(|c| c.is_ascii_lowercase()) {
            messages.push("Password must contain at least one lowercase letter".to_string());
        }
        if !self.password.chars().any(|c| c.is_ascii_digit()) {
            messages.push("Password must contain at least one number".to_string());
        }
        if self.password.chars().all(|c| c.is_ascii_alphanumeric()) {
            messages.push("Password must contain at least one special character".to_string());
        }
        if self.first_name.trim().chars().count() < 2 {
            messages.push("First name must be at least 2 characters".to_string());
        }
        if self.last_name.trim().chars().count() < 2 {
            messages.push("Last name must be at least 2 characters".to_string());
        }
        if self.phone.chars().filter(|c| c.is_ascii_digit()).count() < 10 {
            messages.push("Please enter a valid phone number".to_string());
        }
        if self.age == 0 || self.age > 150 {
            messages.push("Please enter a valid age".to_string());
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(messages))
        }
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// OTP delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpDelivery {
    Email,
    Sms,
    All,
}

/// OTP request input: where to send the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
    pub identifier: String,
    pub delivery_method: OtpDelivery,
}

/// Social identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Facebook,
    Apple,
}

impl SocialProvider {
    /// Path segment for the provider's endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Apple => "apple",
        }
    }
}

/// Password reset input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
}

/// Generic server acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Acknowledgement of an OTP delivery request.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpRequested {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

fn default_true() -> bool {
    true
}

/// Whether an issued OTP is still pending for an identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpStatus {
    /// The server spells the acronym in full uppercase.
    #[serde(rename = "hasActiveOTP")]
    pub has_active_otp: bool,
}

/// Result of a bearer-token verification call. The server always pairs
/// the verdict with the account it verified.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenVerification {
    pub is_valid: bool,
    pub user: User,
}
