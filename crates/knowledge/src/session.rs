//! Interactive sessions with sliding expiry.
//!
//! Expired sessions are swept by one background task that sleeps until the
//! earliest expiry, wakes early whenever sessions change, and exits when
//! [`SessionManager::shutdown`] is called or the manager is dropped.

use chrono::{DateTime, Utc};
use docent_core::SessionConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Session {
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    expires_at: Instant,
}

/// Snapshot of a live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    /// Time left before expiry
    pub remaining_secs: u64,
}

struct Shared {
    sessions: Mutex<HashMap<String, Session>>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop expired sessions; return the earliest remaining expiry.
    fn sweep(&self) -> Option<Instant> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        if sessions.len() < before {
            debug!("Expired {} sessions", before - sessions.len());
        }
        sessions.values().map(|s| s.expires_at).min()
    }
}

/// Issues and tracks session ids.
///
/// Must be created inside a Tokio runtime.
pub struct SessionManager {
    shared: Arc<Shared>,
    timeout: Duration,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Self {
        let shared = Arc::new(Shared {
            sessions: Mutex::new(HashMap::new()),
            changed: Notify::new(),
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(expiry_loop(shared.clone(), shutdown_rx));

        Self {
            shared,
            timeout,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(Duration::from_secs(config.timeout_minutes.max(1) * 60))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a new session and return its id.
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        self.shared.lock().insert(
            id.clone(),
            Session {
                created_at: now,
                last_activity: now,
                expires_at: Instant::now() + self.timeout,
            },
        );
        self.shared.changed.notify_one();
        debug!("Created session {}", id);
        id
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.shared
            .lock()
            .get(id)
            .is_some_and(|s| s.expires_at > Instant::now())
    }

    /// Extend a live session's expiry. Returns false if it is gone.
    pub fn touch(&self, id: &str) -> bool {
        let now = Instant::now();
        let touched = match self.shared.lock().get_mut(id) {
            Some(session) if session.expires_at > now => {
                session.expires_at = now + self.timeout;
                session.last_activity = Utc::now();
                true
            }
            _ => false,
        };
        if touched {
            self.shared.changed.notify_one();
        }
        touched
    }

    pub fn info(&self, id: &str) -> Option<SessionInfo> {
        let now = Instant::now();
        self.shared
            .lock()
            .get(id)
            .filter(|s| s.expires_at > now)
            .map(|s| SessionInfo {
                id: id.to_string(),
                created_at: s.created_at,
                last_activity: s.last_activity,
                remaining_secs: (s.expires_at - now).as_secs(),
            })
    }

    /// End a session now. Returns whether it existed.
    pub fn clear(&self, id: &str) -> bool {
        let removed = self.shared.lock().remove(id).is_some();
        if removed {
            self.shared.changed.notify_one();
        }
        removed
    }

    pub fn active_ids(&self) -> Vec<String> {
        let now = Instant::now();
        let mut ids: Vec<String> = self
            .shared
            .lock()
            .iter()
            .filter(|(_, s)| s.expires_at > now)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn active_count(&self) -> usize {
        self.active_ids().len()
    }

    /// Resolve once `id` has expired or been cleared.
    pub async fn expired(&self, id: &str) {
        loop {
            let deadline = match self.shared.lock().get(id) {
                Some(session) => session.expires_at,
                None => return,
            };
            if deadline <= Instant::now() {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }

    /// Stop the expiry task and wait for it to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.shared.lock().len()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn expiry_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let next = shared.sweep();

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = shared.changed.notified() => {}
            _ = sleep_until_some(next) => {}
        }
    }
    debug!("Session expiry task stopped");
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
