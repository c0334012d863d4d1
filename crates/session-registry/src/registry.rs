//! Session registry and heartbeat.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use state_hub::{StateHub, StateSubscription};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use auth_storage::{StorageAdapter, StorageKeys};

use crate::types::{SessionInfo, SessionState};
use crate::{SessionError, SessionResult};

/// Registry tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the current session's `lastActive` is refreshed
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(60),
        }
    }
}

/// Owner of [`SessionState`] and the liveness heartbeat.
///
/// Constructed once per process next to the auth runtime, sharing its
/// storage. Construction restores a previously persisted session, so a
/// restarted client keeps its session id.
pub struct SessionRegistry {
    storage: Arc<dyn StorageAdapter>,
    config: SessionConfig,
    state: Arc<Mutex<SessionState>>,
    hub: Arc<StateHub<SessionState>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl SessionRegistry {
    /// Creates the registry and restores any persisted session.
    ///
    /// Must run within a tokio runtime; the heartbeat task is spawned
    /// when a session exists.
    pub fn new(storage: Arc<dyn StorageAdapter>, config: SessionConfig) -> Self {
        let registry = Self {
            storage,
            config,
            state: Arc::new(Mutex::new(SessionState::default())),
            hub: Arc::new(StateHub::new()),
            heartbeat: Mutex::new(None),
        };
        registry.restore();
        registry
    }

    /// Subscribe to session state changes.
    ///
    /// The subscription immediately yields the current state. Dropping it
    /// unsubscribes.
    pub fn subscribe(&self) -> StateSubscription<SessionState> {
        let state = self.state.lock().expect("lock poisoned");
        self.hub.subscribe(state.clone())
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.state.lock().expect("lock poisoned").clone()
    }

    /// The current device's session, if one exists.
    pub fn current_session(&self) -> Option<SessionInfo> {
        self.state
            .lock()
            .expect("lock poisoned")
            .current_session
            .clone()
    }

    /// Installs `info` as the current session, persists it, and starts
    /// the heartbeat. Replaces any previous session.
    pub fn create_session(&self, info: SessionInfo) -> SessionResult<()> {
        let raw =
            serde_json::to_string(&info).map_err(|e| SessionError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::SESSION_INFO, &raw)?;

        let session_id = info.id.clone();
        {
            let mut state = self.state.lock().expect("lock poisoned");
            state.current_session = Some(info);
            state.error = None;
            self.hub.notify(&state);
        }

        self.start_heartbeat();
        info!(session_id = %session_id, "session created");
        Ok(())
    }

    /// Refreshes the current session's `lastActive` timestamp and
    /// persists it. No-op when no session exists.
    pub fn update_activity(&self) -> SessionResult<()> {
        persist_activity(&self.state, &self.hub, self.storage.as_ref())
    }

    /// Populates the active-session list.
    ///
    /// No server contract exists for a cross-device listing, so the list
    /// degrades to the one session this client can vouch for: its own.
    pub fn fetch_active_sessions(&self) -> Vec<SessionInfo> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.loading = true;
        state.error = None;
        self.hub.notify(&state);

        let sessions: Vec<SessionInfo> = state.current_session.clone().into_iter().collect();
        state.active_sessions = sessions.clone();
        state.loading = false;
        self.hub.notify(&state);

        sessions
    }

    /// Terminates one session. For the current session this is
    /// [`clear_session`](Self::clear_session); for any other id only the
    /// local list entry is dropped.
    pub fn terminate_session(&self, id: &str) {
        let is_current = {
            let state = self.state.lock().expect("lock poisoned");
            matches!(&state.current_session, Some(s) if s.id == id)
        };

        if is_current {
            self.clear_session();
        } else {
            let mut state = self.state.lock().expect("lock poisoned");
            state.active_sessions.retain(|s| s.id != id);
            self.hub.notify(&state);
            debug!(session_id = %id, "session removed from active list");
        }
    }

    /// Terminates every session including the current one.
    ///
    /// Composes with the runtime's logout(all devices); token cleanup and
    /// session cleanup stay atomic from the caller's point of view.
    pub fn terminate_all_sessions(&self) {
        self.clear_session();
    }

    /// Stops the heartbeat, removes the persisted record, and empties the
    /// state. Storage failures are logged, never surfaced; the in-memory
    /// state is cleared regardless.
    pub fn clear_session(&self) {
        self.stop_heartbeat();
        clear_now(&self.state, &self.hub, self.storage.as_ref());
    }

    /// One restore pass at construction. Malformed or expired records
    /// are removed and treated as absent.
    fn restore(&self) {
        match self.storage.get(StorageKeys::SESSION_INFO) {
            Ok(Some(raw)) => match serde_json::from_str::<SessionInfo>(&raw) {
                Ok(info) if info.is_expired(Utc::now()) => {
                    debug!(session_id = %info.id, "persisted session expired");
                    let _ = self.storage.remove(StorageKeys::SESSION_INFO);
                }
                Ok(info) => {
                    debug!(session_id = %info.id, "session restored");
                    self.state.lock().expect("lock poisoned").current_session = Some(info);
                    self.start_heartbeat();
                }
                Err(e) => {
                    warn!(error = %e, "discarding unreadable session record");
                    let _ = self.storage.remove(StorageKeys::SESSION_INFO);
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "session restore read failed"),
        }
    }

    fn start_heartbeat(&self) {
        self.stop_heartbeat();

        let state = self.state.clone();
        let hub = self.hub.clone();
        let storage = self.storage.clone();
        let period = self.config.heartbeat_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick of a tokio interval completes immediately;
            // consume it so the first heartbeat lands one period in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !heartbeat_tick(&state, &hub, storage.as_ref()) {
                    break;
                }
            }
        });

        *self.heartbeat.lock().expect("lock poisoned") = Some(handle);
    }

    fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().expect("lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

/// One heartbeat: invalidate an expired session, otherwise refresh its
/// activity. Returns false when the loop should end.
fn heartbeat_tick(
    state: &Mutex<SessionState>,
    hub: &StateHub<SessionState>,
    storage: &dyn StorageAdapter,
) -> bool {
    let expired = {
        let state = state.lock().expect("lock poisoned");
        match &state.current_session {
            Some(session) => session.is_expired(Utc::now()),
            None => return false,
        }
    };

    if expired {
        debug!("current session expired");
        clear_now(state, hub, storage);
        return false;
    }

    if let Err(e) = persist_activity(state, hub, storage) {
        warn!(error = %e, "heartbeat failed to persist activity");
    }
    true
}

fn persist_activity(
    state: &Mutex<SessionState>,
    hub: &StateHub<SessionState>,
    storage: &dyn StorageAdapter,
) -> SessionResult<()> {
    let mut state = state.lock().expect("lock poisoned");
    let Some(current) = state.current_session.as_ref() else {
        return Ok(());
    };

    let mut updated = current.clone();
    updated.last_active = Utc::now();

    // Persist before the in-memory swap so a failed write never leaves
    // memory ahead of storage.
    let raw = serde_json::to_string(&updated).map_err(|e| SessionError::Encoding(e.to_string()))?;
    storage.set(StorageKeys::SESSION_INFO, &raw)?;

    state.current_session = Some(updated);
    hub.notify(&state);
    Ok(())
}

fn clear_now(
    state: &Mutex<SessionState>,
    hub: &StateHub<SessionState>,
    storage: &dyn StorageAdapter,
) {
    if let Err(e) = storage.remove(StorageKeys::SESSION_INFO) {
        warn!(error = %e, "failed to remove persisted session");
    }

    let mut state = state.lock().expect("lock poisoned");
    *state = SessionState::default();
    hub.notify(&state);
    info!("session cleared");
}
