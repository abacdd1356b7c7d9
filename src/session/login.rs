//! Login handshake: QR issuance, scan polling, credential extraction, init.

use tokio::sync::watch;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

use super::{decode_json, QrCode, Session, SessionState};
use crate::error::{Result, WebWxError};
use crate::protocol::{
    InitResponse, SessionCredentials, TextAssignments, ASSIGNMENT_SUCCESS, QR_LOGIN_CODE,
    QR_LOGIN_UUID, WINDOW_CODE, WINDOW_REDIRECT_URI,
};

impl Session {
    /// Request a correlation UUID and compute the QR display URL.
    ///
    /// The QR image itself is never fetched; the URL is the public contract.
    pub async fn issue_qr(&self) -> Result<QrCode> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_transition_to(SessionState::QrIssued) {
            return Err(WebWxError::InvalidStateTransition {
                from: inner.state,
                to: SessionState::QrIssued,
            });
        }

        let endpoints = &self.config().endpoints;
        let timestamp = super::transport::unix_timestamp().to_string();
        let params = [
            ("appid", endpoints.app_id.as_str()),
            ("fun", "new"),
            ("lang", endpoints.lang.as_str()),
            ("_", timestamp.as_str()),
        ];
        let body = self
            .http()
            .post(format!("{}/jslogin", endpoints.login_base))
            .form(&params)
            .send()
            .await?
            .bytes()
            .await?;

        let parsed = TextAssignments::parse(&body);
        if parsed.get(QR_LOGIN_CODE) != Some(ASSIGNMENT_SUCCESS) {
            let code = parsed
                .get(QR_LOGIN_CODE)
                .and_then(|c| c.parse().ok())
                .unwrap_or(-1);
            return Err(WebWxError::protocol(code, "uuid issuance refused"));
        }
        let uuid = parsed
            .get(QR_LOGIN_UUID)
            .ok_or_else(|| WebWxError::Parse("uuid missing from issuance response".to_string()))?
            .to_string();

        self.set_uuid(uuid.clone());
        inner.state.transition_to(SessionState::QrIssued)?;
        info!(key = self.key(), %uuid, "qr issued");

        Ok(QrCode {
            url: format!("{}{uuid}", endpoints.qr_base),
            uuid,
        })
    }

    /// Poll the login-status endpoint until the QR code is scanned and
    /// confirmed, the deadline elapses, or the shutdown signal fires.
    ///
    /// Poll-level transport and parse failures are tolerated inside this
    /// bounded retry loop; everything else propagates. On timeout the
    /// session stays in `AwaitingScan` and the wait may be retried. The
    /// shutdown signal is observed at least once per polling interval;
    /// a closed sender counts as shutdown.
    pub async fn wait_for_login(
        &self,
        timeout: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.state.transition_to(SessionState::AwaitingScan)?;
        }
        let uuid = self
            .uuid()
            .ok_or_else(|| WebWxError::Parse("correlation uuid missing".to_string()))?
            .to_string();

        let interval = self.config().poll_interval();
        let deadline = Instant::now() + timeout;
        info!(key = self.key(), %uuid, ?timeout, "waiting for scan");

        loop {
            if *shutdown.borrow() {
                info!(key = self.key(), %uuid, "login wait canceled");
                return Err(WebWxError::Canceled);
            }
            if Instant::now() >= deadline {
                warn!(key = self.key(), %uuid, "login wait timed out");
                return Err(WebWxError::LoginTimeout(timeout));
            }

            match self.poll_login_status(&uuid).await {
                Ok(Some(redirect_url)) => {
                    let mut inner = self.inner.lock().await;
                    inner.redirect_url = Some(redirect_url);
                    inner.state.transition_to(SessionState::Redirected)?;
                    info!(key = self.key(), %uuid, "scan confirmed");
                    return Ok(());
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(key = self.key(), %uuid, %err, "login poll failed, will retry");
                }
            }

            let next_poll = deadline.min(Instant::now() + interval);
            tokio::select! {
                () = sleep_until(next_poll) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(key = self.key(), %uuid, "login wait canceled");
                        return Err(WebWxError::Canceled);
                    }
                }
            }
        }
    }

    /// One login-status poll. `Ok(Some(url))` when the scan was confirmed,
    /// `Ok(None)` while pending (not scanned, scanned-but-unconfirmed, or
    /// canceled on the phone).
    async fn poll_login_status(&self, uuid: &str) -> Result<Option<String>> {
        let endpoints = &self.config().endpoints;
        let timestamp = super::transport::unix_timestamp().to_string();
        let body = self
            .http()
            .get(format!(
                "{}/cgi-bin/mmwebwx-bin/login",
                endpoints.login_base
            ))
            .query(&[("uuid", uuid), ("tip", "1"), ("_", &timestamp)])
            .send()
            .await?
            .bytes()
            .await?;

        let parsed = TextAssignments::parse(&body);
        let code = parsed.get(WINDOW_CODE).unwrap_or_default();
        if code != ASSIGNMENT_SUCCESS {
            debug!(key = self.key(), %uuid, code, "scan pending");
            return Ok(None);
        }
        let redirect_url = parsed
            .get(WINDOW_REDIRECT_URI)
            .ok_or_else(|| {
                WebWxError::Parse("redirect uri missing from login response".to_string())
            })?
            .to_string();
        Ok(Some(redirect_url))
    }

    /// Fetch and decode credentials from the redirect endpoint.
    ///
    /// On a decode failure the session stays `Redirected` and the call may
    /// be retried. Success performs the session's single empty-to-non-empty
    /// pass-ticket transition.
    pub async fn complete_handshake(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_transition_to(SessionState::CredentialsSet) {
            return Err(WebWxError::InvalidStateTransition {
                from: inner.state,
                to: SessionState::CredentialsSet,
            });
        }
        let redirect_url = inner
            .redirect_url
            .clone()
            .ok_or_else(|| WebWxError::Parse("redirect url missing".to_string()))?;

        let body = self
            .http()
            .get(format!("{redirect_url}&fun=new"))
            .send()
            .await?
            .text()
            .await?;

        let mut credentials = SessionCredentials::from_xml(&body)?;
        credentials.device_id = self.device_id().to_string();
        inner.credentials = credentials;
        inner.state.transition_to(SessionState::CredentialsSet)?;
        self.set_authenticated();
        info!(key = self.key(), "credentials set");
        Ok(())
    }

    /// Run the init call: fetch the user record, the initial contact
    /// snapshot, the chat set, and the first sync cursor.
    pub async fn initialize(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.credentials.is_authenticated() {
            return Err(WebWxError::NotLoggedIn);
        }
        if !inner.state.can_transition_to(SessionState::Initialized) {
            return Err(WebWxError::InvalidStateTransition {
                from: inner.state,
                to: SessionState::Initialized,
            });
        }

        let url = format!(
            "{}/webwxinit?pass_ticket={}",
            self.config().endpoints.web_base,
            inner.credentials.pass_ticket
        );
        let request = serde_json::json!({ "BaseRequest": inner.credentials });
        let body = self
            .http()
            .post(url)
            .json(&request)
            .send()
            .await?
            .text()
            .await?;

        let response: InitResponse = decode_json(&body)?;
        response.base_response.clone().into_result()?;

        inner.user = response.user;
        inner.init_contacts = response.contact_list;
        inner.chat_set = response
            .chat_set
            .split(',')
            .filter(|peer| !peer.is_empty())
            .map(str::to_string)
            .collect();
        // The cursor is replaced wholesale, never merged.
        inner.sync_cursor = response.sync_key.into();
        inner.state.transition_to(SessionState::Initialized)?;
        info!(
            key = self.key(),
            user = %inner.user.user_name,
            contacts = inner.init_contacts.len(),
            "session initialized"
        );
        Ok(())
    }
}
