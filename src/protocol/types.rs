//! JSON wire types and the sync-check JS-literal response.
//!
//! Field names follow the remote protocol's PascalCase JSON exactly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WebWxError};

/// Status code meaning success inside JSON response bodies.
pub const STATUS_SUCCESS: i64 = 0;

/// Text message envelope type.
pub const MSG_TYPE_TEXT: i64 = 1;
/// Image message envelope type.
pub const MSG_TYPE_IMAGE: i64 = 3;

/// Sync-check retcode meaning the remote session is still valid.
pub const SYNC_RET_SUCCESS: i64 = 0;

/// Status envelope present in every JSON response body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BaseResponse {
    /// Status code; zero means success.
    pub ret: i64,
    /// Server-supplied error message.
    pub err_msg: String,
}

impl BaseResponse {
    /// Convert a non-success status into a protocol error.
    pub fn into_result(self) -> Result<()> {
        if self.ret == STATUS_SUCCESS {
            Ok(())
        } else {
            Err(WebWxError::protocol(self.ret, self.err_msg))
        }
    }
}

/// One contact directory entry.
///
/// Used both for the authenticated user record and for fetched members;
/// fields the server omits default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ContactRecord {
    /// Opaque protocol username (`@...` / `@@...` prefixed).
    pub user_name: String,
    /// Display name.
    pub nick_name: String,
    /// Avatar URL.
    pub head_img_url: String,
    /// Caller-assigned remark name.
    pub remark_name: String,
    /// Profile signature.
    pub signature: String,
    /// Account verification bit flags; bit 3 marks official accounts.
    pub verify_flag: i64,
    /// Contact bit flags.
    pub contact_flag: i64,
    pub sex: i64,
    pub star_friend: i64,
    pub province: String,
    pub city: String,
    pub alias: String,
    pub display_name: String,
}

/// Wire form of the sync key: counted list of `(Key, Val)` pairs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SyncKey {
    pub count: i64,
    pub list: Vec<SyncKeyItem>,
}

/// One sync key pair.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SyncKeyItem {
    pub key: i64,
    pub val: i64,
}

/// Ordered sync cursor, replaced wholesale on every successful initialize.
///
/// Serialized as `k1_v1|k2_v2|...` for the sync-check query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor(Vec<(i64, i64)>);

impl SyncCursor {
    /// Serialize the cursor for the `synckey` query parameter.
    pub fn to_query(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}_{v}"))
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Whether the cursor holds no pairs yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<SyncKey> for SyncCursor {
    fn from(key: SyncKey) -> Self {
        Self(key.list.into_iter().map(|kv| (kv.key, kv.val)).collect())
    }
}

/// Decoded body of the init endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct InitResponse {
    pub base_response: BaseResponse,
    /// The authenticated user's own record.
    pub user: ContactRecord,
    /// Initial contact snapshot.
    pub contact_list: Vec<ContactRecord>,
    /// Comma-delimited usernames of active conversation peers.
    pub chat_set: String,
    pub sync_key: SyncKey,
    #[serde(rename = "SKey")]
    pub skey: String,
}

/// Decoded body of the contact-list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ContactListResponse {
    pub base_response: BaseResponse,
    pub member_count: i64,
    pub member_list: Vec<ContactRecord>,
    pub seq: i64,
}

/// Decoded body of the send-message endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SendResponse {
    pub base_response: BaseResponse,
    #[serde(rename = "MsgID")]
    pub msg_id: String,
    #[serde(rename = "LocalID")]
    pub local_id: String,
}

/// Decoded body of the media-upload endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MediaUploadResponse {
    pub base_response: BaseResponse,
    pub media_id: String,
}

/// Outbound message envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageEnvelope {
    #[serde(rename = "Type")]
    pub msg_type: i64,
    pub content: String,
    pub from_user_name: String,
    pub to_user_name: String,
    #[serde(rename = "LocalID")]
    pub local_id: String,
    pub client_msg_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub media_id: String,
}

/// Result of a sync-check poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCheckStatus {
    /// Zero while the remote session is valid.
    pub ret_code: i64,
    /// Which kind of new data is pending.
    pub selector: i64,
}

impl SyncCheckStatus {
    /// Whether the remote session is still valid.
    pub fn is_valid(&self) -> bool {
        self.ret_code == SYNC_RET_SUCCESS
    }
}

static SYNC_CHECK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"window\.synccheck=\{retcode:"(\d+)",selector:"(\d+)"\}"#).unwrap());

/// Extract `(retcode, selector)` from a sync-check body.
///
/// The body is a single JS-literal assignment, not JSON; anything that does
/// not match the fixed pattern is a protocol error.
pub fn parse_sync_check(body: &str) -> Result<SyncCheckStatus> {
    let captures = SYNC_CHECK_RE
        .captures(body)
        .ok_or_else(|| WebWxError::protocol(-1, "unexpected sync response shape"))?;
    let ret_code = captures[1]
        .parse()
        .map_err(|_| WebWxError::Parse("sync retcode overflow".to_string()))?;
    let selector = captures[2]
        .parse()
        .map_err(|_| WebWxError::Parse("sync selector overflow".to_string()))?;
    Ok(SyncCheckStatus { ret_code, selector })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_response_into_result() {
        assert!(BaseResponse {
            ret: 0,
            err_msg: String::new()
        }
        .into_result()
        .is_ok());

        let err = BaseResponse {
            ret: 1101,
            err_msg: "session expired".to_string(),
        }
        .into_result()
        .unwrap_err();
        match err {
            WebWxError::Protocol { code, message } => {
                assert_eq!(code, 1101);
                assert_eq!(message, "session expired");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_sync_cursor_query() {
        let cursor: SyncCursor = SyncKey {
            count: 2,
            list: vec![
                SyncKeyItem { key: 1, val: 100 },
                SyncKeyItem { key: 2, val: 200 },
            ],
        }
        .into();
        assert_eq!(cursor.to_query(), "1_100|2_200");
        assert!(!cursor.is_empty());
    }

    #[test]
    fn test_sync_cursor_empty() {
        let cursor = SyncCursor::default();
        assert!(cursor.is_empty());
        assert_eq!(cursor.to_query(), "");
    }

    #[test]
    fn test_init_response_decoding() {
        let body = r#"{
            "BaseResponse": {"Ret": 0, "ErrMsg": ""},
            "User": {"UserName": "@me", "NickName": "Me"},
            "ContactList": [{"UserName": "@friend", "NickName": "Friend"}],
            "ChatSet": "@friend,filehelper",
            "SyncKey": {"Count": 1, "List": [{"Key": 1, "Val": 635684}]},
            "SKey": "@crypt_x"
        }"#;
        let resp: InitResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.base_response.ret, 0);
        assert_eq!(resp.user.user_name, "@me");
        assert_eq!(resp.contact_list.len(), 1);
        assert_eq!(resp.chat_set, "@friend,filehelper");
        assert_eq!(resp.sync_key.list.len(), 1);
        assert_eq!(resp.skey, "@crypt_x");
    }

    #[test]
    fn test_contact_record_defaults_missing_fields() {
        let record: ContactRecord =
            serde_json::from_str(r#"{"UserName": "@@group", "VerifyFlag": 0}"#).unwrap();
        assert_eq!(record.user_name, "@@group");
        assert_eq!(record.nick_name, "");
        assert_eq!(record.verify_flag, 0);
    }

    #[test]
    fn test_message_envelope_shape() {
        let envelope = MessageEnvelope {
            msg_type: MSG_TYPE_TEXT,
            content: "hello".to_string(),
            from_user_name: "@me".to_string(),
            to_user_name: "@you".to_string(),
            local_id: "17000000000123".to_string(),
            client_msg_id: "17000000000123".to_string(),
            media_id: String::new(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["Type"], 1);
        assert_eq!(json["Content"], "hello");
        assert_eq!(json["FromUserName"], "@me");
        assert_eq!(json["ToUserName"], "@you");
        assert_eq!(json["LocalID"], "17000000000123");
        assert_eq!(json["ClientMsgId"], "17000000000123");
        // Empty media id stays off the wire for text messages
        assert!(json.get("MediaId").is_none());
    }

    #[test]
    fn test_parse_sync_check() {
        let status =
            parse_sync_check(r#"window.synccheck={retcode:"0",selector:"2"}"#).unwrap();
        assert_eq!(status.ret_code, 0);
        assert_eq!(status.selector, 2);
        assert!(status.is_valid());
    }

    #[test]
    fn test_parse_sync_check_invalidated() {
        let status =
            parse_sync_check(r#"window.synccheck={retcode:"1101",selector:"0"}"#).unwrap();
        assert!(!status.is_valid());
    }

    #[test]
    fn test_parse_sync_check_mismatch() {
        for body in ["", "<html></html>", r#"window.synccheck={retcode:0,selector:2}"#] {
            let err = parse_sync_check(body).unwrap_err();
            assert!(matches!(err, WebWxError::Protocol { .. }), "body: {body}");
        }
    }
}
