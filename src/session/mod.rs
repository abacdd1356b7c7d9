//! One user's end-to-end protocol client.
//!
//! A [`Session`] owns its HTTP transport (with the cookie jar that carries
//! the server-side session), the login handshake state machine, the
//! credentials, the sync cursor, and the classified contact caches.
//!
//! Handshake steps are strictly sequential and driven by exactly one
//! background task; foreground operations serialize through an internal
//! async mutex so a sync check can never interleave with a contact refresh
//! on the same session.

mod login;
mod ops;
mod state;
mod transport;

pub use state::SessionState;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::contacts::ContactDirectory;
use crate::error::{Result, WebWxError};
use crate::protocol::{ContactRecord, SessionCredentials, SyncCursor};

/// QR login handle returned by [`Session::issue_qr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCode {
    /// URL at which the QR image can be displayed.
    pub url: String,
    /// Correlation UUID linking the QR code to its scan status.
    pub uuid: String,
}

/// Mutable session state guarded by the per-session mutex.
#[derive(Debug, Default)]
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) redirect_url: Option<String>,
    pub(crate) credentials: SessionCredentials,
    pub(crate) user: ContactRecord,
    pub(crate) chat_set: Vec<String>,
    pub(crate) init_contacts: Vec<ContactRecord>,
    pub(crate) sync_cursor: SyncCursor,
    pub(crate) directory: ContactDirectory,
}

/// One authenticated (or authenticating) end user's protocol client.
pub struct Session {
    key: String,
    config: Arc<Config>,
    client: reqwest::Client,
    device_id: String,
    /// Correlation UUID; set once by `issue_qr`, immutable afterward.
    uuid: OnceLock<String>,
    /// Flips to true exactly once, when credentials are extracted.
    authenticated: AtomicBool,
    /// Consecutive non-success sync-check retcodes.
    sync_failures: AtomicU32,
    pub(crate) inner: Mutex<SessionInner>,
}

impl Session {
    /// Create a fresh, unauthenticated session.
    pub fn new(key: impl Into<String>, config: Arc<Config>) -> Result<Self> {
        let client = transport::build_client(&config)?;
        Ok(Self {
            key: key.into(),
            config,
            client,
            device_id: transport::generate_device_id(),
            uuid: OnceLock::new(),
            authenticated: AtomicBool::new(false),
            sync_failures: AtomicU32::new(0),
            inner: Mutex::new(SessionInner::default()),
        })
    }

    /// External session key this session is registered under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Correlation UUID, once a QR code has been issued.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.get().map(|u| u.as_str())
    }

    /// Whether login has completed.
    ///
    /// True iff the pass ticket has been set; this is the sole gate used by
    /// every post-login operation. Never blocks behind in-flight operations.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Consecutive sync-check failures since the last success.
    pub fn sync_failures(&self) -> u32 {
        self.sync_failures.load(Ordering::Relaxed)
    }

    /// Mark this session expired after remote invalidation.
    pub async fn expire(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_terminal() {
            let _ = inner.state.transition_to(SessionState::Expired);
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn device_id(&self) -> &str {
        &self.device_id
    }

    pub(crate) fn set_uuid(&self, uuid: String) {
        let _ = self.uuid.set(uuid);
    }

    pub(crate) fn set_authenticated(&self) {
        self.authenticated.store(true, Ordering::Release);
    }

    pub(crate) fn record_sync_failure(&self) -> u32 {
        self.sync_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn reset_sync_failures(&self) {
        self.sync_failures.store(0, Ordering::Relaxed);
    }

    /// Gate shared by every post-login operation.
    pub(crate) fn require_login(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(WebWxError::NotLoggedIn)
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("uuid", &self.uuid.get())
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

/// Decode a JSON response body, mapping failures to [`WebWxError::Parse`].
pub(crate) fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|err| WebWxError::Parse(format!("json decode: {err}")))
}
