//! Background login poller pool.
//!
//! A fixed set of workers drains the admission queue. Each worker owns one
//! session's handshake end to end: scan wait, credential extraction, init.
//! Failures are logged and the session is dropped from the queue; the
//! caller must issue a fresh QR to retry.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

use crate::config::Config;
use crate::session::Session;

pub(super) fn spawn_workers(
    config: Arc<Config>,
    pending: mpsc::Receiver<Arc<Session>>,
    shutdown: watch::Receiver<bool>,
) {
    let pending = Arc::new(Mutex::new(pending));
    for worker in 0..config.login.workers.max(1) {
        let config = Arc::clone(&config);
        let pending = Arc::clone(&pending);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            worker_loop(worker, config, pending, shutdown).await;
        });
    }
}

async fn worker_loop(
    worker: usize,
    config: Arc<Config>,
    pending: Arc<Mutex<mpsc::Receiver<Arc<Session>>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let session = tokio::select! {
            changed = shutdown.changed() => {
                match changed {
                    Ok(()) if !*shutdown.borrow() => continue,
                    _ => break,
                }
            }
            received = async { pending.lock().await.recv().await } => {
                match received {
                    Some(session) => session,
                    // Queue sender dropped; registry is gone
                    None => break,
                }
            }
        };

        if session.is_authenticated() {
            continue;
        }
        drive_login(worker, &config, &session, shutdown.clone()).await;
    }
}

/// Run one session's full handshake. Errors are terminal for this admission;
/// the session is not re-queued.
async fn drive_login(
    worker: usize,
    config: &Config,
    session: &Arc<Session>,
    shutdown: watch::Receiver<bool>,
) {
    let key = session.key().to_string();
    if let Err(err) = session
        .wait_for_login(config.login_deadline(), shutdown)
        .await
    {
        warn!(worker, key = %key, %err, "login wait failed");
        return;
    }
    if let Err(err) = session.complete_handshake().await {
        warn!(worker, key = %key, %err, "handshake completion failed");
        return;
    }
    if let Err(err) = session.initialize().await {
        warn!(worker, key = %key, %err, "session init failed");
        return;
    }
    info!(worker, key = %key, "login completed");
}
