//! Process-wide session registry and keyed operation facade.
//!
//! The registry owns the only map shared between tasks; every access goes
//! through its lock-guarded API. It also owns the bounded admission queue
//! feeding the background login poller pool and the shutdown signal that
//! cancels in-flight scan waits.

mod poller;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::Config;
use crate::contacts::ContactBuckets;
use crate::error::{Result, WebWxError};
use crate::protocol::SyncCheckStatus;
use crate::session::{QrCode, Session};

/// Consecutive sync-check failures after which a session is evicted.
const SYNC_EVICTION_THRESHOLD: u32 = 3;

/// Thread-safe mapping from external session keys to live sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    config: Arc<Config>,
    pending: mpsc::Sender<Arc<Session>>,
    shutdown: watch::Sender<bool>,
}

impl SessionRegistry {
    /// Create a registry and spawn its login poller pool.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: Config) -> Arc<Self> {
        let config = Arc::new(config);
        let (pending_tx, pending_rx) = mpsc::channel(config.login.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        poller::spawn_workers(Arc::clone(&config), pending_rx, shutdown_rx);
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            pending: pending_tx,
            shutdown: shutdown_tx,
        })
    }

    /// Create a fresh session for `key`, replacing any prior entry.
    ///
    /// A new QR request invalidates the previous session for that key; no
    /// reference to the old session remains reachable from the registry.
    pub fn create(&self, key: &str) -> Result<Arc<Session>> {
        let session = Arc::new(Session::new(key, Arc::clone(&self.config))?);
        let mut sessions = self.sessions.write().map_err(|_| WebWxError::LockPoisoned)?;
        if sessions
            .insert(key.to_string(), Arc::clone(&session))
            .is_some()
        {
            info!(key, "replaced existing session");
        }
        Ok(session)
    }

    /// Get the session registered under `key`.
    pub fn get(&self, key: &str) -> Result<Option<Arc<Session>>> {
        let sessions = self.sessions.read().map_err(|_| WebWxError::LockPoisoned)?;
        Ok(sessions.get(key).cloned())
    }

    /// Remove a session from the registry.
    ///
    /// Returns the removed session, or None if it didn't exist.
    pub fn remove(&self, key: &str) -> Result<Option<Arc<Session>>> {
        let mut sessions = self.sessions.write().map_err(|_| WebWxError::LockPoisoned)?;
        Ok(sessions.remove(key))
    }

    /// Visit every live session (background sweeps).
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &Arc<Session>),
    {
        let sessions = self.sessions.read().map_err(|_| WebWxError::LockPoisoned)?;
        for (key, session) in sessions.iter() {
            f(key, session);
        }
        Ok(())
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Signal shutdown: cancels in-flight scan waits and stops the poller
    /// pool.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Publish a session onto the bounded admission queue.
    fn enqueue_login(&self, session: &Arc<Session>) -> Result<()> {
        self.pending
            .try_send(Arc::clone(session))
            .map_err(|_| WebWxError::QueueFull)
    }

    // Keyed facade consumed by the request-routing layer.

    /// Create a session for `key`, issue its QR code, and hand it to the
    /// login poller pool.
    ///
    /// The session is admitted to the queue only after the correlation UUID
    /// exists, so a poller never races an unissued QR.
    pub async fn issue_qr(&self, key: &str) -> Result<QrCode> {
        let session = self.create(key)?;
        let qr = match session.issue_qr().await {
            Ok(qr) => qr,
            Err(err) => {
                self.remove(key)?;
                return Err(err);
            }
        };
        if let Err(err) = self.enqueue_login(&session) {
            warn!(key, "login queue full, dropping session");
            self.remove(key)?;
            return Err(err);
        }
        Ok(qr)
    }

    /// Whether the session under `key` has completed login. Missing
    /// sessions are simply not authenticated.
    pub fn is_authenticated(&self, key: &str) -> bool {
        self.get(key)
            .ok()
            .flatten()
            .is_some_and(|session| session.is_authenticated())
    }

    /// Fetch and classify the contact directory for `key`.
    pub async fn fetch_contacts(&self, key: &str) -> Result<ContactBuckets> {
        self.require(key)?.fetch_contacts().await
    }

    /// Send a text message from the session under `key`.
    pub async fn send_text(&self, key: &str, to_user_name: &str, text: &str) -> Result<()> {
        self.require(key)?.send_text(to_user_name, text).await
    }

    /// Upload a media file and send it from the session under `key`.
    pub async fn send_media(&self, key: &str, to_user_name: &str, path: &Path) -> Result<()> {
        self.require(key)?.send_media(to_user_name, path).await
    }

    /// Run a sync-check poll for `key`.
    ///
    /// Repeated non-success retcodes indicate server-side invalidation; the
    /// session is expired and evicted after the third consecutive failure.
    pub async fn sync_check(&self, key: &str) -> Result<SyncCheckStatus> {
        let session = self.require(key)?;
        let status = session.sync_check().await?;
        if !status.is_valid() && session.sync_failures() >= SYNC_EVICTION_THRESHOLD {
            warn!(
                key,
                retcode = status.ret_code,
                "evicting session after repeated sync failures"
            );
            session.expire().await;
            self.remove(key)?;
        }
        Ok(status)
    }

    fn require(&self, key: &str) -> Result<Arc<Session>> {
        self.get(key)?
            .ok_or_else(|| WebWxError::SessionNotFound(key.to_string()))
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
