//! Remote protocol surface: text-assignment parsing, credentials, and
//! JSON/JS-literal wire types.
//!
//! The service predates JSON-everywhere web APIs; login endpoints answer
//! with JavaScript assignments, the redirect endpoint with XML, and the rest
//! with PascalCase JSON. This module owns all three decodings.

mod assignments;
mod credentials;
mod types;

pub use assignments::{
    TextAssignments, ASSIGNMENT_SUCCESS, QR_LOGIN_CODE, QR_LOGIN_UUID, WINDOW_CODE,
    WINDOW_REDIRECT_URI,
};
pub use credentials::SessionCredentials;
pub use types::{
    parse_sync_check, BaseResponse, ContactListResponse, ContactRecord, InitResponse,
    MediaUploadResponse, MessageEnvelope, SendResponse, SyncCheckStatus, SyncCursor, SyncKey,
    SyncKeyItem, MSG_TYPE_IMAGE, MSG_TYPE_TEXT, STATUS_SUCCESS, SYNC_RET_SUCCESS,
};
