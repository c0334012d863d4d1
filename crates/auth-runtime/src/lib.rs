//! Client-side authentication runtime.
//!
//! [`AuthRuntime`] is the single authority over [`AuthState`]: it runs
//! every authentication operation against the remote API, persists the
//! outcome through the injected storage adapter, and fans the new state
//! out to subscribers.
//!
//! ```text
//!   UI action
//!      |
//!      v
//!  AuthRuntime ----> AuthClient ----> /auth/* endpoint
//!      |                                    |
//!      |<--------- normalized result -------+
//!      v
//!  mutate AuthState -> persist -> notify subscribers
//!      |
//!      +-> SessionRegistry (create / touch the device session)
//! ```
//!
//! # Design principles
//!
//! - **One authority.** Exactly one runtime per process owns the auth
//!   state; everyone else observes it through snapshots and
//!   subscriptions.
//! - **Fail safe, never fail open.** When persistence or teardown
//!   partially fails, the runtime lands on "signed out", not on a state
//!   claiming credentials it cannot prove it holds.
//! - **Logout wins.** A logout issued while another operation is in
//!   flight supersedes it; the late result is discarded, and the final
//!   persisted state is signed out.

mod config;
mod error;
mod runtime;
mod state;

#[cfg(test)]
mod tests;

pub use config::RuntimeConfig;
pub use error::{AuthError, AuthResult};
pub use runtime::AuthRuntime;
pub use state::{AuthState, TokenPair};

// The transport and session types UI layers handle directly.
pub use auth_transport::{
    ApiError, MessageResponse, OtpDelivery, OtpRequested, RegisterData, Role, SocialProvider, User,
};
pub use session_registry::{SessionInfo, SessionRegistry, SessionState};
