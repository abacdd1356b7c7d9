//! Authenticated session credentials.
//!
//! The redirect endpoint answers with a small XML document:
//!
//! ```xml
//! <error><ret>0</ret><message></message><skey>@crypt_...</skey>
//! <wxsid>abc</wxsid><wxuin>1234</wxuin><pass_ticket>t</pass_ticket></error>
//! ```
//!
//! The relevant fields are extracted with anchored patterns rather than a
//! full XML decoder; the document is flat and its shape has been stable for
//! years. The credentials are attached (as `BaseRequest`) to every
//! authenticated JSON request.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{Result, WebWxError};

static RET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<ret>(-?\d+)</ret>").unwrap());
static MESSAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<message>(.*?)</message>").unwrap());
static SKEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<skey>(.*?)</skey>").unwrap());
static SID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<wxsid>(.*?)</wxsid>").unwrap());
static UIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<wxuin>(-?\d+)</wxuin>").unwrap());
static PASS_TICKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<pass_ticket>(.*?)</pass_ticket>").unwrap());

fn xml_field<'a>(re: &Regex, body: &'a str) -> Option<&'a str> {
    re.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Credentials extracted from the redirect endpoint, sent as the
/// `BaseRequest` member of every authenticated JSON request.
///
/// An empty `pass_ticket` means the session is not authenticated; this is
/// the sole authentication predicate. Credentials are either absent or fully
/// populated from one decode, never partially valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionCredentials {
    /// Status code from the redirect response.
    #[serde(skip)]
    pub ret: i64,
    /// Status message from the redirect response.
    #[serde(skip)]
    pub message: String,
    /// Session key.
    #[serde(rename = "Skey")]
    pub skey: String,
    /// Session id.
    #[serde(rename = "Sid")]
    pub sid: String,
    /// Numeric user identifier.
    #[serde(rename = "Uin")]
    pub uin: i64,
    /// Pass ticket; empty until login completes.
    #[serde(skip)]
    pub pass_ticket: String,
    /// Client-generated device id.
    #[serde(rename = "DeviceID")]
    pub device_id: String,
}

impl SessionCredentials {
    /// Decode credentials from the redirect endpoint's XML body.
    ///
    /// Fails with [`WebWxError::Parse`] when the body does not carry the
    /// expected fields (a redirect error page, typically) and with
    /// [`WebWxError::Protocol`] when the body is well-formed but reports a
    /// non-success `ret`.
    pub fn from_xml(body: &str) -> Result<Self> {
        let ret = xml_field(&RET_RE, body)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let message = xml_field(&MESSAGE_RE, body).unwrap_or_default();
        if ret != 0 {
            return Err(WebWxError::protocol(ret, message));
        }

        let skey = xml_field(&SKEY_RE, body).unwrap_or_default();
        let sid = xml_field(&SID_RE, body).unwrap_or_default();
        let pass_ticket = xml_field(&PASS_TICKET_RE, body).unwrap_or_default();
        if skey.is_empty() || sid.is_empty() || pass_ticket.is_empty() {
            return Err(WebWxError::Parse(
                "credential fields missing from redirect response".to_string(),
            ));
        }
        let uin = xml_field(&UIN_RE, body)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(Self {
            ret,
            message: message.to_string(),
            skey: skey.to_string(),
            sid: sid.to_string(),
            uin,
            pass_ticket: pass_ticket.to_string(),
            device_id: String::new(),
        })
    }

    /// Whether these credentials represent a completed login.
    pub fn is_authenticated(&self) -> bool {
        !self.pass_ticket.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "<error><ret>0</ret><message>OK</message>\
        <skey>@crypt_a_b</skey><wxsid>sid123</wxsid><wxuin>4242</wxuin>\
        <pass_ticket>ticket%2Fx</pass_ticket><isgrayscale>1</isgrayscale></error>";

    #[test]
    fn test_from_xml() {
        let creds = SessionCredentials::from_xml(BODY).unwrap();
        assert_eq!(creds.ret, 0);
        assert_eq!(creds.message, "OK");
        assert_eq!(creds.skey, "@crypt_a_b");
        assert_eq!(creds.sid, "sid123");
        assert_eq!(creds.uin, 4242);
        assert_eq!(creds.pass_ticket, "ticket%2Fx");
        assert!(creds.is_authenticated());
    }

    #[test]
    fn test_from_xml_error_page() {
        let err = SessionCredentials::from_xml("<html>Moved</html>").unwrap_err();
        assert!(matches!(err, WebWxError::Parse(_)));
    }

    #[test]
    fn test_from_xml_non_success_ret() {
        let body = "<error><ret>-2023</ret><message>expired</message></error>";
        let err = SessionCredentials::from_xml(body).unwrap_err();
        match err {
            WebWxError::Protocol { code, message } => {
                assert_eq!(code, -2023);
                assert_eq!(message, "expired");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_xml_empty_pass_ticket() {
        let body = "<error><ret>0</ret><skey>s</skey><wxsid>x</wxsid>\
            <wxuin>1</wxuin><pass_ticket></pass_ticket></error>";
        let err = SessionCredentials::from_xml(body).unwrap_err();
        assert!(matches!(err, WebWxError::Parse(_)));
    }

    #[test]
    fn test_default_not_authenticated() {
        assert!(!SessionCredentials::default().is_authenticated());
    }

    #[test]
    fn test_base_request_serialization() {
        let mut creds = SessionCredentials::from_xml(BODY).unwrap();
        creds.device_id = "e123456789012345".to_string();
        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json["Skey"], "@crypt_a_b");
        assert_eq!(json["Sid"], "sid123");
        assert_eq!(json["Uin"], 4242);
        assert_eq!(json["DeviceID"], "e123456789012345");
        // Never leak the pass ticket into request bodies
        assert!(json.get("pass_ticket").is_none());
        assert!(json.get("PassTicket").is_none());
    }
}
