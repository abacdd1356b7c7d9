//! # webwx-client
//!
//! Multi-session client for the reverse-engineered web WeChat messaging
//! protocol: QR-code login, contact directory sync, outbound text/media
//! messages, and sync-status polling.
//!
//! ## Features
//!
//! - **QR login handshake**: UUID issuance, scan polling with deadline and
//!   cancellation, credential extraction, session init
//! - **Concurrent sessions**: a lock-guarded registry plus a background
//!   login poller pool; each end user owns one independent session
//! - **Typed protocol surface**: the service's text-assignment, XML, and
//!   PascalCase-JSON bodies decoded into plain value types
//!
//! ## Quick Start
//!
//! ```no_run
//! use webwx_client::{Config, SessionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> webwx_client::Result<()> {
//!     webwx_client::logging::try_init().ok();
//!
//!     let registry = SessionRegistry::new(Config::default());
//!
//!     // Issue a QR code; the background pool polls for the scan.
//!     let qr = registry.issue_qr("user-1").await?;
//!     println!("scan {} to log in", qr.url);
//!
//!     // Once scanned and initialized:
//!     if registry.is_authenticated("user-1") {
//!         let contacts = registry.fetch_contacts("user-1").await?;
//!         println!("{} groups", contacts.groups.len());
//!         registry.send_text("user-1", "@friend", "hello").await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod contacts;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use contacts::{classify, ContactBuckets, ContactDirectory, ContactKind};
pub use error::{Result, WebWxError};
pub use protocol::{ContactRecord, SessionCredentials, SyncCheckStatus, SyncCursor};
pub use registry::SessionRegistry;
pub use session::{QrCode, Session, SessionState};
