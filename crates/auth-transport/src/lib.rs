//! HTTP transport for the remote authentication API.
//!
//! [`AuthClient`] translates domain operations into calls against the
//! `/auth/*` endpoint family and normalizes every failure mode into
//! [`ApiError`]:
//!
//! - 200/201 decode into the typed response
//! - 401 becomes [`ApiError::InvalidCredentials`] or
//!   [`ApiError::InvalidOtp`] depending on the call
//! - other 4xx become [`ApiError::Validation`] with the server's
//!   messages preserved in order
//! - 5xx and connection failures become [`ApiError::ServiceUnavailable`]
//! - an elapsed deadline becomes [`ApiError::Timeout`]
//!
//! The client performs no retries; retry policy belongs to callers.

mod client;
mod error;
mod types;

pub use client::{AuthClient, DEFAULT_TIMEOUT};
pub use error::{ApiError, ApiResult};
pub use types::{
    AuthResponse, LoginCredentials, MessageResponse, OtpDelivery, OtpRequest, OtpRequested,
    OtpStatus, PasswordReset, RegisterData, Role, SocialProvider, TokenVerification, User,
};
