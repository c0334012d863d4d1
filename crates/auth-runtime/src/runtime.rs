//! The authentication state machine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use auth_storage::{StorageAdapter, StorageError, StorageKeys};
use auth_transport::{
    ApiError, AuthClient, AuthResponse, LoginCredentials, MessageResponse, OtpDelivery, OtpRequest,
    OtpRequested, PasswordReset, RegisterData, SocialProvider, User,
};
use session_registry::{SessionConfig, SessionInfo, SessionRegistry};
use state_hub::{StateHub, StateSubscription};

use crate::config::RuntimeConfig;
use crate::error::{AuthError, AuthResult};
use crate::state::{AuthState, TokenPair};

/// Process-wide authentication authority.
///
/// Constructed once by the composition root and shared behind an `Arc`.
/// Every operation follows the same protocol: mark the state loading,
/// run the remote call, then commit the outcome and notify subscribers.
/// State mutations and their notifications happen under one lock, so
/// subscribers observe states in the order they were produced.
///
/// Construction must happen inside a tokio runtime; restoring a
/// persisted session starts its heartbeat task.
pub struct AuthRuntime {
    api: AuthClient,
    storage: Arc<dyn StorageAdapter>,
    sessions: Arc<SessionRegistry>,
    state: Mutex<AuthState>,
    hub: StateHub<AuthState>,
    /// Bumped by every teardown (logout, refresh failure). Operations
    /// capture the value when they start; a mismatch at commit time
    /// means a teardown superseded them and their result is dropped.
    epoch: AtomicU64,
    config: RuntimeConfig,
}

impl AuthRuntime {
    /// Builds the runtime and runs its one rehydration pass.
    pub fn new(config: RuntimeConfig) -> Self {
        let api = AuthClient::with_timeout(config.base_url.clone(), config.request_timeout);
        let sessions = Arc::new(SessionRegistry::new(
            config.storage.clone(),
            SessionConfig {
                heartbeat_interval: config.heartbeat_interval,
            },
        ));

        let runtime = Self {
            api,
            storage: config.storage.clone(),
            sessions,
            state: Mutex::new(AuthState::default()),
            hub: StateHub::new(),
            epoch: AtomicU64::new(0),
            config,
        };
        runtime.rehydrate();
        runtime
    }

    /// Snapshot of the current authentication state.
    pub fn state(&self) -> AuthState {
        self.state.lock().expect("lock poisoned").clone()
    }

    /// Subscribe to authentication state changes.
    ///
    /// The subscription immediately yields the current state, so late
    /// subscribers are never stale. Dropping it unsubscribes.
    pub fn subscribe(&self) -> StateSubscription<AuthState> {
        let state = self.state.lock().expect("lock poisoned");
        self.hub.subscribe(state.clone())
    }

    /// The session registry sharing this runtime's storage.
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    /// Exchange credentials for a token pair and sign in.
    ///
    /// The server may include a `redirect_path` routing hint in its
    /// response. It is advisory UI data, not auth state, so the runtime
    /// drops it; a shell that routes on it should call
    /// [`AuthClient::login`] directly.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<User> {
        let epoch = self.begin();
        let credentials = LoginCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        match self.api.login(&credentials).await {
            Ok(response) => self.complete_sign_in(epoch, response),
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Create an account. Does not authenticate; the caller directs the
    /// user to sign in (or verify an OTP) afterwards.
    pub async fn register(&self, data: &RegisterData) -> AuthResult<User> {
        let epoch = self.begin();
        if let Err(e) = data.validate() {
            return Err(self.raise(epoch, e));
        }
        match self.api.register(data).await {
            Ok(created) => {
                self.finish(epoch);
                Ok(created)
            }
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Create an account together with its clinic.
    pub async fn register_with_clinic(
        &self,
        data: &RegisterData,
        clinic_name: &str,
    ) -> AuthResult<User> {
        let epoch = self.begin();
        if let Err(e) = data.validate() {
            return Err(self.raise(epoch, e));
        }
        match self.api.register_with_clinic(data, clinic_name).await {
            Ok(created) => {
                self.finish(epoch);
                Ok(created)
            }
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Ask the server to deliver a one-time passcode.
    pub async fn request_otp(
        &self,
        identifier: &str,
        delivery: OtpDelivery,
    ) -> AuthResult<OtpRequested> {
        let epoch = self.begin();
        let request = OtpRequest {
            identifier: identifier.to_string(),
            delivery_method: delivery,
        };
        match self.api.request_otp(&request).await {
            Ok(ack) => {
                self.finish(epoch);
                Ok(ack)
            }
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Exchange a delivered passcode for a token pair and sign in.
    ///
    /// A well-formed response without both tokens is rejected as
    /// [`ApiError::InvalidResponse`]; any failure clears whatever auth
    /// data the attempt may have produced before the error is raised.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> AuthResult<User> {
        let epoch = self.begin();
        match self.api.verify_otp(email, otp).await {
            Ok(response)
                if response.access_token.is_empty() || response.refresh_token.is_empty() =>
            {
                let error = AuthError::Api(ApiError::invalid_response(
                    "OTP verification response carried no token pair",
                ));
                self.discard_partial_auth(epoch, &error);
                Err(error)
            }
            Ok(response) => self.complete_sign_in(epoch, response),
            Err(e) => {
                let error = AuthError::from(e);
                self.discard_partial_auth(epoch, &error);
                Err(error)
            }
        }
    }

    /// Whether an undelivered OTP is still pending for an identifier.
    pub async fn check_otp_status(&self, identifier: &str) -> AuthResult<bool> {
        let epoch = self.begin();
        match self.api.check_otp_status(identifier).await {
            Ok(status) => {
                self.finish(epoch);
                Ok(status.has_active_otp)
            }
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Invalidate any pending OTP for an identifier.
    pub async fn invalidate_otp(&self, identifier: &str) -> AuthResult<()> {
        let epoch = self.begin();
        match self.api.invalidate_otp(identifier).await {
            Ok(()) => {
                self.finish(epoch);
                Ok(())
            }
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Start the forgotten-password flow.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<MessageResponse> {
        let epoch = self.begin();
        match self.api.forgot_password(email).await {
            Ok(message) => {
                self.finish(epoch);
                Ok(message)
            }
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Complete the forgotten-password flow with the emailed token.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> AuthResult<MessageResponse> {
        let epoch = self.begin();
        let reset = PasswordReset {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        match self.api.reset_password(&reset).await {
            Ok(message) => {
                self.finish(epoch);
                Ok(message)
            }
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Ask the server to email a magic sign-in link.
    pub async fn request_magic_link(&self, email: &str) -> AuthResult<MessageResponse> {
        let epoch = self.begin();
        match self.api.request_magic_link(email).await {
            Ok(message) => {
                self.finish(epoch);
                Ok(message)
            }
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Exchange a magic-link token for a token pair and sign in.
    pub async fn verify_magic_link(&self, token: &str) -> AuthResult<User> {
        let epoch = self.begin();
        match self.api.verify_magic_link(token).await {
            Ok(response) => self.complete_sign_in(epoch, response),
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Exchange a provider-issued OAuth token for a token pair and sign in.
    pub async fn social_login(&self, provider: SocialProvider, token: &str) -> AuthResult<User> {
        let epoch = self.begin();
        match self.api.social_login(provider, token).await {
            Ok(response) => self.complete_sign_in(epoch, response),
            Err(e) => Err(self.raise(epoch, e)),
        }
    }

    /// Replace the token pair using the stored refresh token.
    ///
    /// Succeeding leaves `user` untouched and touches the device session
    /// instead of minting a new one. Failing ends the authenticated
    /// session entirely: a refresh token the server rejects leaves this
    /// client with no path back to a valid access token.
    pub async fn refresh_token(&self) -> AuthResult<()> {
        let epoch = self.begin();

        // A missing refresh token ends the session the same way a
        // rejected one does; stale persisted auth must not survive it.
        let stored = match self.storage.get(StorageKeys::REFRESH_TOKEN) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                let error = AuthError::NotAuthenticated;
                self.sign_out_after_refresh_failure(epoch, &error);
                return Err(error);
            }
            Err(e) => {
                let error = AuthError::from(e);
                self.sign_out_after_refresh_failure(epoch, &error);
                return Err(error);
            }
        };

        match self.api.refresh(&stored).await {
            Ok(response) => self.complete_refresh(epoch, response),
            Err(e) => {
                let error = AuthError::from(e);
                self.sign_out_after_refresh_failure(epoch, &error);
                Err(error)
            }
        }
    }

    /// Ask the server whether the held bearer token is still valid.
    ///
    /// Passive: no state transition, no loading toggle. Callers use it
    /// at startup to decide between the app shell and a fresh sign-in.
    pub async fn verify_token(&self) -> AuthResult<bool> {
        let verification = self.api.verify_token().await?;
        Ok(verification.is_valid)
    }

    /// Sign out of this device, or of every device.
    ///
    /// The remote call is best-effort: a failure is logged and local
    /// teardown proceeds regardless. The client must never stay signed
    /// in because the server was unreachable.
    pub async fn logout(&self, all_devices: bool) -> AuthResult<()> {
        let session_id = self.sessions.current_session().map(|s| s.id);
        {
            let mut state = self.state.lock().expect("lock poisoned");
            state.loading = true;
            state.error = None;
            self.hub.notify(&state);
        }

        // Remote first, while the bearer token still applies.
        if let Err(e) = self.api.logout(session_id.as_deref(), all_devices).await {
            warn!(error = %e, "remote logout failed; clearing local state anyway");
        }

        self.force_sign_out(all_devices);
        info!(all_devices, "signed out");
        Ok(())
    }

    /// Signs out everywhere. Shorthand for [`logout`](Self::logout) with
    /// `all_devices` set; the session list empties as part of teardown.
    pub async fn terminate_all_sessions(&self) -> AuthResult<()> {
        self.logout(true).await
    }

    /// Starts the shared operation protocol: loading on, error cleared,
    /// subscribers notified. Returns the epoch the operation belongs to.
    fn begin(&self) -> u64 {
        let mut state = self.state.lock().expect("lock poisoned");
        state.loading = true;
        state.error = None;
        self.hub.notify(&state);
        self.epoch.load(Ordering::SeqCst)
    }

    /// Ends an operation whose success changes nothing beyond the
    /// loading flag.
    fn finish(&self, epoch: u64) {
        let mut state = self.state.lock().expect("lock poisoned");
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        state.loading = false;
        self.hub.notify(&state);
    }

    /// Records a failed operation and hands the error back for raising.
    fn raise(&self, epoch: u64, error: impl Into<AuthError>) -> AuthError {
        let error = error.into();
        let mut state = self.state.lock().expect("lock poisoned");
        if self.epoch.load(Ordering::SeqCst) == epoch {
            state.loading = false;
            state.error = Some(error.to_string());
            self.hub.notify(&state);
        }
        error
    }

    /// Commits a successful authenticating response: persist the
    /// credentials, install the bearer token, create the device session,
    /// then flip the state. Runs under the state lock so a concurrent
    /// teardown cannot interleave.
    fn complete_sign_in(&self, epoch: u64, response: AuthResponse) -> AuthResult<User> {
        let tokens = TokenPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        };
        let user = response.user;

        let mut state = self.state.lock().expect("lock poisoned");
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("sign-in result superseded by logout");
            return Ok(user);
        }

        if let Err(e) = self.persist_sign_in(&tokens, &user) {
            self.abort_sign_in(&mut state, &e);
            return Err(e);
        }

        self.api.set_auth_token(Some(tokens.access_token.clone()));

        // Session first, state second: a subscriber reacting to the
        // authenticated state must already find a consistent session.
        let session =
            SessionInfo::new_current(self.config.device_descriptor(), self.config.session_ttl);
        if let Err(e) = self.sessions.create_session(session) {
            let error = AuthError::from(e);
            self.abort_sign_in(&mut state, &error);
            return Err(error);
        }

        *state = AuthState::authenticated(user.clone(), tokens);
        self.hub.notify(&state);
        info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    fn complete_refresh(&self, epoch: u64, response: AuthResponse) -> AuthResult<()> {
        let tokens = TokenPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        };

        let mut state = self.state.lock().expect("lock poisoned");
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("refresh result superseded by logout");
            return Ok(());
        }

        // The refresh grant replaces tokens; the identity it carries
        // only fills a gap, it never overwrites what the state holds.
        let user = match state.user.clone() {
            Some(user) => user,
            None => response.user,
        };

        if let Err(e) = self.persist_sign_in(&tokens, &user) {
            self.abort_sign_in(&mut state, &e);
            return Err(e);
        }

        self.api.set_auth_token(Some(tokens.access_token.clone()));

        if self.sessions.current_session().is_some() {
            if let Err(e) = self.sessions.update_activity() {
                warn!(error = %e, "failed to touch session after refresh");
            }
        } else {
            let session =
                SessionInfo::new_current(self.config.device_descriptor(), self.config.session_ttl);
            if let Err(e) = self.sessions.create_session(session) {
                warn!(error = %e, "failed to recreate session after refresh");
            }
        }

        *state = AuthState::authenticated(user, tokens);
        self.hub.notify(&state);
        debug!("token pair replaced");
        Ok(())
    }

    /// Writes the individual credential keys plus the aggregate
    /// rehydration snapshot.
    fn persist_sign_in(&self, tokens: &TokenPair, user: &User) -> AuthResult<()> {
        let user_json =
            serde_json::to_string(user).map_err(|e| StorageError::Encoding(e.to_string()))?;
        let snapshot =
            serde_json::to_string(&AuthState::authenticated(user.clone(), tokens.clone()))
                .map_err(|e| StorageError::Encoding(e.to_string()))?;

        self.storage.set(StorageKeys::ACCESS_TOKEN, &tokens.access_token)?;
        self.storage.set(StorageKeys::REFRESH_TOKEN, &tokens.refresh_token)?;
        self.storage.set(StorageKeys::USER, &user_json)?;
        self.storage.set(StorageKeys::AUTH_STATE, &snapshot)?;
        Ok(())
    }

    /// Unwinds a sign-in whose persistence failed. Half-written
    /// credentials are worse than none, so everything goes.
    fn abort_sign_in(&self, state: &mut AuthState, error: &AuthError) {
        self.clear_persisted_auth();
        self.api.set_auth_token(None);
        self.sessions.clear_session();
        *state = AuthState {
            error: Some(error.to_string()),
            ..AuthState::default()
        };
        self.hub.notify(state);
    }

    /// Drops whatever credentials a failed sign-in attempt may have
    /// written and records the failure. Any session the runtime was
    /// carrying ends with them; a rejected credential check leaves
    /// nothing signed in.
    fn discard_partial_auth(&self, epoch: u64, error: &AuthError) {
        let mut state = self.state.lock().expect("lock poisoned");
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        self.api.set_auth_token(None);
        self.sessions.clear_session();
        self.clear_persisted_auth();
        state.loading = false;
        state.error = Some(error.to_string());
        state.is_authenticated = false;
        state.user = None;
        state.tokens = None;
        self.hub.notify(&state);
    }

    fn sign_out_after_refresh_failure(&self, epoch: u64, error: &AuthError) {
        let mut state = self.state.lock().expect("lock poisoned");
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("refresh failure superseded by logout");
            return;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.api.set_auth_token(None);
        self.sessions.clear_session();
        self.clear_persisted_auth();
        *state = AuthState {
            error: Some(error.to_string()),
            ..AuthState::default()
        };
        self.hub.notify(&state);
        info!("auth cleared after refresh failure");
    }

    /// Local teardown shared by both logout flavors. Runs under the
    /// state lock; in-flight operations that complete afterwards see a
    /// bumped epoch and drop their results.
    fn force_sign_out(&self, all_devices: bool) {
        let mut state = self.state.lock().expect("lock poisoned");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.api.set_auth_token(None);
        if all_devices {
            self.sessions.terminate_all_sessions();
        } else {
            self.sessions.clear_session();
        }
        self.clear_persisted_auth();
        *state = AuthState::default();
        self.hub.notify(&state);
    }

    /// Best-effort removal of every auth storage key. Failures are
    /// logged, never raised; the in-memory state is the authority.
    fn clear_persisted_auth(&self) {
        for key in StorageKeys::AUTH_KEYS {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "failed to clear auth key");
            }
        }
    }

    /// One rehydration pass at construction. Reads only the aggregate
    /// snapshot; malformed or inconsistent data is cleared and treated
    /// as signed out. Never contacts the transport.
    fn rehydrate(&self) {
        match self.storage.get(StorageKeys::AUTH_STATE) {
            Ok(Some(raw)) => match serde_json::from_str::<AuthState>(&raw) {
                Ok(restored) if restored.is_authenticated => {
                    if restored.user.is_none() || restored.tokens.is_none() {
                        warn!("persisted auth snapshot is incomplete; discarding");
                        self.clear_persisted_auth();
                        return;
                    }
                    if let Some(tokens) = &restored.tokens {
                        self.api.set_auth_token(Some(tokens.access_token.clone()));
                    }
                    debug!("auth state restored");
                    *self.state.lock().expect("lock poisoned") = restored;
                }
                Ok(_) => {} // an explicitly signed-out snapshot
                Err(e) => {
                    warn!(error = %e, "discarding unreadable auth snapshot");
                    self.clear_persisted_auth();
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "auth rehydration read failed"),
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}
