//! Storage key constants.
//!
//! Key names are shared with the platform layers (the web client reads
//! some of them directly), so they stay camelCase.

/// Logical storage keys used by the auth and session services
pub struct StorageKeys;

impl StorageKeys {
    /// Access token (bearer credential)
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Refresh token
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Authenticated user (JSON)
    pub const USER: &'static str = "user";

    /// Current device session (JSON)
    pub const SESSION_INFO: &'static str = "sessionInfo";

    /// Remember-me preference ("true"/"false")
    pub const REMEMBER_ME: &'static str = "rememberMe";

    /// Aggregate auth snapshot used for rehydration (JSON)
    pub const AUTH_STATE: &'static str = "auth";

    /// Every key the auth side of the store may hold, for bulk cleanup.
    pub const AUTH_KEYS: [&'static str; 4] = [
        Self::ACCESS_TOKEN,
        Self::REFRESH_TOKEN,
        Self::USER,
        Self::AUTH_STATE,
    ];
}
