//! Post-login operations: contact directory, outbound messages, sync check.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use tracing::{info, warn};

use super::{decode_json, transport, Session};
use crate::contacts::ContactBuckets;
use crate::error::{Result, WebWxError};
use crate::protocol::{
    parse_sync_check, ContactListResponse, ContactRecord, MediaUploadResponse, MessageEnvelope,
    SendResponse, SessionCredentials, SyncCheckStatus, MSG_TYPE_IMAGE, MSG_TYPE_TEXT,
};

/// The official web client sends a browser timestamp here; the server
/// ignores the value.
const LAST_MODIFIED_DATE: &str = "Mon Feb 13 2017 17:27:23 GMT+8000(CST)";

/// MIME type and protocol media tag for a file name.
fn media_kind(file_name: &str) -> (&'static str, &'static str) {
    let is_gif = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));
    if is_gif {
        ("image/gif", "doc")
    } else {
        ("image/jpeg", "pic")
    }
}

impl Session {
    /// Fetch the member list, rebuild the classified contact cache, and
    /// reconcile the chat set captured at init time.
    ///
    /// Returns group and personal-contact buckets; the official-account
    /// bucket is computed and cached but withheld by policy.
    pub async fn fetch_contacts(&self) -> Result<ContactBuckets> {
        self.require_login()?;
        let mut inner = self.inner.lock().await;

        let url = format!(
            "{}/webwxgetcontact?pass_ticket={}&skey={}&r={}",
            self.config().endpoints.web_base,
            inner.credentials.pass_ticket,
            inner.credentials.skey,
            transport::unix_timestamp(),
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
        let response: ContactListResponse = decode_json(&body)?;
        response.base_response.clone().into_result()?;

        inner.directory.rebuild(response.member_list);
        // The session's own record is addressable too
        let me = ContactRecord {
            user_name: inner.user.user_name.clone(),
            nick_name: inner.user.nick_name.clone(),
            ..ContactRecord::default()
        };
        inner.directory.insert_member(me);

        // Chat-set peers missing from the init snapshot are hydrated from
        // the member map with a minimal record.
        let chat_set = inner.chat_set.clone();
        for peer in chat_set {
            if inner.init_contacts.iter().any(|c| c.user_name == peer) {
                continue;
            }
            let hydrated = inner.directory.member(&peer).map(|member| ContactRecord {
                user_name: member.user_name.clone(),
                nick_name: member.nick_name.clone(),
                signature: member.signature.clone(),
                ..ContactRecord::default()
            });
            if let Some(record) = hydrated {
                inner.init_contacts.push(record);
            }
        }

        info!(
            key = self.key(),
            groups = inner.directory.groups().len(),
            contacts = inner.directory.contacts().len(),
            members = inner.directory.member_count(),
            "contact directory refreshed"
        );
        Ok(ContactBuckets {
            groups: inner.directory.groups().to_vec(),
            contacts: inner.directory.contacts().to_vec(),
        })
    }

    /// Send a text message.
    pub async fn send_text(&self, to_user_name: &str, text: &str) -> Result<()> {
        self.require_login()?;
        let inner = self.inner.lock().await;

        let msg_id = transport::client_msg_id();
        let envelope = MessageEnvelope {
            msg_type: MSG_TYPE_TEXT,
            content: text.to_string(),
            from_user_name: inner.user.user_name.clone(),
            to_user_name: to_user_name.to_string(),
            local_id: msg_id.clone(),
            client_msg_id: msg_id,
            media_id: String::new(),
        };
        let url = format!(
            "{}/webwxsendmsg?pass_ticket={}&skey={}&r={}",
            self.config().endpoints.web_base,
            inner.credentials.pass_ticket,
            inner.credentials.skey,
            transport::unix_timestamp(),
        );
        self.post_send(url, &envelope, &inner.credentials).await?;
        info!(key = self.key(), to = to_user_name, "text message sent");
        Ok(())
    }

    /// Upload a media file, then send an image message referencing it.
    ///
    /// Failure at either phase aborts the whole operation; no partial send
    /// is reported as success.
    pub async fn send_media(&self, to_user_name: &str, media_path: &Path) -> Result<()> {
        self.require_login()?;
        let media_id = self.upload_media(media_path).await?;
        let inner = self.inner.lock().await;

        let msg_id = transport::client_msg_id();
        let envelope = MessageEnvelope {
            msg_type: MSG_TYPE_IMAGE,
            content: String::new(),
            from_user_name: inner.user.user_name.clone(),
            to_user_name: to_user_name.to_string(),
            local_id: msg_id.clone(),
            client_msg_id: msg_id,
            media_id,
        };
        let url = format!(
            "{}/webwxsendmsgimg?fun=async&pass_ticket={}&skey={}&r={}",
            self.config().endpoints.web_base,
            inner.credentials.pass_ticket,
            inner.credentials.skey,
            transport::unix_timestamp(),
        );
        self.post_send(url, &envelope, &inner.credentials).await?;
        info!(key = self.key(), to = to_user_name, "media message sent");
        Ok(())
    }

    /// Stream a file to the media-upload endpoint, returning the
    /// server-assigned media id.
    pub async fn upload_media(&self, media_path: &Path) -> Result<String> {
        self.require_login()?;
        let data = tokio::fs::read(media_path).await?;
        let file_name = media_path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                WebWxError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "media path has no file name",
                ))
            })?;
        let (mime, media_type) = media_kind(&file_name);
        let size = data.len();

        let inner = self.inner.lock().await;
        let upload_request = serde_json::json!({
            "BaseRequest": inner.credentials,
            "TotalLen": size,
            "StartPos": 0,
            "DataLen": size,
            "ClientMediaId": transport::client_msg_id(),
        });
        let form = Form::new()
            .text("id", "WU_FILE_0")
            .text("name", file_name.clone())
            .text("type", mime)
            .text("lastModifiedDate", LAST_MODIFIED_DATE)
            .text("size", size.to_string())
            .text("mediatype", media_type)
            .text("uploadmediarequest", upload_request.to_string())
            // The cookie jar carries the real data ticket
            .text("webwx_data_ticket", "")
            .part(
                "filename",
                Part::bytes(data).file_name(file_name).mime_str(mime)?,
            );

        let url = format!(
            "{}/webwxuploadmedia?f=json&fun=async&pass_ticket={}&skey={}&r={}",
            self.config().endpoints.web_base,
            inner.credentials.pass_ticket,
            inner.credentials.skey,
            transport::unix_timestamp(),
        );
        let body = self
            .http()
            .post(url)
            .multipart(form)
            .send()
            .await?
            .text()
            .await?;
        let response: MediaUploadResponse = decode_json(&body)?;
        response.base_response.clone().into_result()?;
        if response.media_id.is_empty() {
            return Err(WebWxError::protocol(-1, "upload returned no media id"));
        }
        info!(key = self.key(), media_id = %response.media_id, "media uploaded");
        Ok(response.media_id)
    }

    /// Poll the sync-check endpoint with the current cursor.
    ///
    /// The body is a JS-literal assignment, not JSON; a non-matching body is
    /// a protocol error and leaves the stored cursor untouched. Non-success
    /// retcodes indicate the remote session has been invalidated.
    pub async fn sync_check(&self) -> Result<SyncCheckStatus> {
        self.require_login()?;
        let inner = self.inner.lock().await;

        let timestamp = transport::unix_timestamp().to_string();
        let sync_key = inner.sync_cursor.to_query();
        let uin = inner.credentials.uin.to_string();
        let body = self
            .http()
            .get(format!("{}/synccheck", self.config().endpoints.push_base))
            .query(&[
                ("r", timestamp.as_str()),
                ("skey", inner.credentials.skey.as_str()),
                ("sid", inner.credentials.sid.as_str()),
                ("uin", uin.as_str()),
                ("deviceid", self.device_id()),
                ("synckey", sync_key.as_str()),
                ("_", timestamp.as_str()),
            ])
            .send()
            .await?
            .text()
            .await?;

        let status = parse_sync_check(&body)?;
        if status.is_valid() {
            self.reset_sync_failures();
        } else {
            let failures = self.record_sync_failure();
            warn!(
                key = self.key(),
                retcode = status.ret_code,
                failures,
                "sync check reported invalid session"
            );
        }
        Ok(status)
    }

    async fn post_send(
        &self,
        url: String,
        envelope: &MessageEnvelope,
        credentials: &SessionCredentials,
    ) -> Result<()> {
        let request = serde_json::json!({
            "BaseRequest": credentials,
            "Msg": envelope,
        });
        let body = self
            .http()
            .post(url)
            .json(&request)
            .send()
            .await?
            .text()
            .await?;
        let response: SendResponse = decode_json(&body)?;
        response.base_response.into_result()
    }
}
