//! Per-session HTTP transport and client-side identifier generation.
//!
//! Each session owns one `reqwest::Client` with its own cookie store; the
//! cookies are the actual bearer of server-side session state and must live
//! as long as the session does.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::Result;

/// Build the session's HTTP client.
///
/// Cookie store enabled, ~60s total timeout, and (per config) invalid TLS
/// certificates tolerated; the target service's certificates fail strict
/// verification.
pub(crate) fn build_client(config: &Config) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(config.http_timeout())
        .danger_accept_invalid_certs(config.http.accept_invalid_certs)
        .user_agent(config.endpoints.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Generate a client device id: `e` followed by 15 decimal digits.
pub(crate) fn generate_device_id() -> String {
    let digits: u64 = rand::rng().random_range(0..1_000_000_000_000_000);
    format!("e{digits:015}")
}

/// Generate a client message id: current unix timestamp, a `0` separator,
/// and a 3-digit random suffix.
///
/// Uniqueness is best-effort within a narrow time window; the remote service
/// deduplicates by more than this field alone.
pub(crate) fn client_msg_id() -> String {
    let suffix: u16 = rand::rng().random_range(0..1000);
    format!("{}0{suffix:03}", unix_timestamp())
}

/// Seconds since the unix epoch, as sent in `r=` / `_=` query parameters.
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
