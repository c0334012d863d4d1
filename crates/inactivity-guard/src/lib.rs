//! Inactivity-based auto-logout.
//!
//! [`InactivityGuard`] watches the auth runtime and a stream of
//! activity signals from the platform layer (pointer movement, key
//! press, tap, scroll, all funneled into
//! [`activity_observed`](InactivityGuard::activity_observed)). While a
//! user is signed in and has not opted into "remember me", every
//! observed activity restarts a countdown; when the countdown elapses
//! the guard signs the user out of this device.
//!
//! The countdown arms on sign-in, re-arms on activity, and disarms on
//! sign-out or when "remember me" turns on. The preference is persisted
//! under its own storage key and read once at startup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use auth_runtime::AuthRuntime;
use auth_storage::{StorageAdapter, StorageKeys, StorageResult};

/// Default idle window before a forced sign-out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Policy component forcing sign-out after a period without activity.
pub struct InactivityGuard {
    runtime: Arc<AuthRuntime>,
    storage: Arc<dyn StorageAdapter>,
    timeout: Duration,
    remember_me: Arc<AtomicBool>,
    countdown: Arc<Mutex<Option<JoinHandle<()>>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl InactivityGuard {
    /// Builds the guard and reads the persisted remember-me preference.
    /// Call [`start`](Self::start) to begin watching the runtime.
    pub fn new(runtime: Arc<AuthRuntime>, storage: Arc<dyn StorageAdapter>) -> Self {
        Self::with_timeout(runtime, storage, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        runtime: Arc<AuthRuntime>,
        storage: Arc<dyn StorageAdapter>,
        timeout: Duration,
    ) -> Self {
        let remembered = match storage.get(StorageKeys::REMEMBER_ME) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(error = %e, "failed to read remember-me preference");
                false
            }
        };

        Self {
            runtime,
            storage,
            timeout,
            remember_me: Arc::new(AtomicBool::new(remembered)),
            countdown: Arc::new(Mutex::new(None)),
            monitor: Mutex::new(None),
        }
    }

    /// Begins watching authentication state. Arms the countdown right
    /// away when the runtime is already signed in. Idempotent.
    pub fn start(&self) {
        let mut slot = self.monitor.lock().expect("lock poisoned");
        if slot.is_some() {
            return;
        }

        let mut sub = self.runtime.subscribe();
        let runtime = self.runtime.clone();
        let remember_me = self.remember_me.clone();
        let countdown = self.countdown.clone();
        let timeout = self.timeout;

        *slot = Some(tokio::spawn(async move {
            // Reacts to authentication transitions only; loading and
            // error churn inside a signed-in stretch never re-arms.
            let mut was_authenticated = false;
            while let Some(state) = sub.recv().await {
                let authenticated = state.is_authenticated;
                if authenticated && !was_authenticated && !remember_me.load(Ordering::SeqCst) {
                    arm(&countdown, runtime.clone(), timeout);
                }
                if !authenticated && was_authenticated {
                    disarm(&countdown);
                }
                was_authenticated = authenticated;
            }
        }));
    }

    /// One observed user interaction. Restarts the countdown while it
    /// matters; a no-op when signed out or remembering the user.
    pub fn activity_observed(&self) {
        if self.remember_me.load(Ordering::SeqCst) {
            return;
        }
        if !self.runtime.state().is_authenticated {
            return;
        }
        arm(&self.countdown, self.runtime.clone(), self.timeout);
    }

    /// Persists the remember-me preference and applies it immediately:
    /// turning it on kills the countdown, turning it off re-arms it for
    /// a signed-in user.
    pub fn set_remember_me(&self, enabled: bool) -> StorageResult<()> {
        self.storage
            .set(StorageKeys::REMEMBER_ME, if enabled { "true" } else { "false" })?;
        self.remember_me.store(enabled, Ordering::SeqCst);

        if enabled {
            disarm(&self.countdown);
        } else if self.runtime.state().is_authenticated {
            arm(&self.countdown, self.runtime.clone(), self.timeout);
        }
        info!(enabled, "remember-me preference updated");
        Ok(())
    }

    pub fn remember_me(&self) -> bool {
        self.remember_me.load(Ordering::SeqCst)
    }

    /// Stops watching and cancels any pending countdown.
    pub fn stop(&self) {
        if let Some(handle) = self.monitor.lock().expect("lock poisoned").take() {
            handle.abort();
        }
        disarm(&self.countdown);
    }
}

impl Drop for InactivityGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// (Re)starts the countdown. The previous timer, if any, is cancelled,
/// so at most one countdown is ever pending.
fn arm(countdown: &Mutex<Option<JoinHandle<()>>>, runtime: Arc<AuthRuntime>, timeout: Duration) {
    let mut slot = countdown.lock().expect("lock poisoned");
    if let Some(handle) = slot.take() {
        handle.abort();
    }
    *slot = Some(tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        info!("inactivity window elapsed; signing out");
        if let Err(e) = runtime.logout(false).await {
            warn!(error = %e, "inactivity sign-out failed");
        }
    }));
    debug!(?timeout, "inactivity countdown armed");
}

fn disarm(countdown: &Mutex<Option<JoinHandle<()>>>) {
    if let Some(handle) = countdown.lock().expect("lock poisoned").take() {
        handle.abort();
        debug!("inactivity countdown disarmed");
    }
}
