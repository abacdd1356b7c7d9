//! Text-assignment parsing.
//!
//! Several login endpoints answer with `key = value;` fragments executed as
//! JavaScript by the official web client instead of JSON. The format is
//! undocumented, so parsing is deliberately loose: fragments without an `=`
//! are dropped silently and only a small fixed set of keys is ever consumed.

use std::collections::HashMap;

/// Key carrying the login-status code.
pub const WINDOW_CODE: &str = "window.code";
/// Key carrying the post-scan redirect URL.
pub const WINDOW_REDIRECT_URI: &str = "window.redirect_uri";
/// Key carrying the correlation UUID on QR issuance.
pub const QR_LOGIN_UUID: &str = "window.QRLogin.uuid";
/// Key carrying the status code on QR issuance.
pub const QR_LOGIN_CODE: &str = "window.QRLogin.code";

/// Status code meaning success in text-assignment responses.
pub const ASSIGNMENT_SUCCESS: &str = "200";

/// A parsed text-assignment response.
///
/// Case-preserving map from assignment keys to their unquoted values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextAssignments(HashMap<String, String>);

impl TextAssignments {
    /// Parse a byte sequence of `;`-separated `lhs=rhs` fragments.
    ///
    /// Whitespace around `=` is ignored and surrounding double quotes on the
    /// value are stripped. The last occurrence of a duplicate key wins.
    /// Malformed fragments never fail; they are skipped.
    pub fn parse(body: &[u8]) -> Self {
        let mut map = HashMap::new();
        let text = String::from_utf8_lossy(body);
        for fragment in text.split(';') {
            let fragment = fragment.trim_matches(['\n', '\t', '\r']);
            let Some(eq) = fragment.find('=') else {
                continue;
            };
            let key = fragment[..eq].trim_matches(' ');
            let value = fragment[eq + 1..].trim_matches(' ').trim_matches('"');
            map.insert(key.to_string(), value.to_string());
        }
        Self(map)
    }

    /// Look up an assignment value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    /// Whether no assignments were parsed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of parsed assignments.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}
