//! In-process HTTP stub for integration tests.
//!
//! Serves canned bodies per path and records every request target so tests
//! can assert call counts and query parameters without touching the
//! network.

// Each test binary uses a different subset of the helpers.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct RouteEntry {
    /// Bodies served in order; the last one repeats.
    bodies: VecDeque<String>,
    last: String,
    /// Full request targets (path + query) seen for this route.
    requests: Vec<String>,
}

#[derive(Clone, Default)]
struct Routes(Arc<Mutex<HashMap<String, RouteEntry>>>);

/// A single-purpose HTTP/1.1 responder bound to a loopback port.
pub struct StubServer {
    addr: SocketAddr,
    routes: Routes,
}

impl StubServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Routes::default();
        let server_routes = routes.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = server_routes.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, routes).await;
                });
            }
        });
        Self { addr, routes }
    }

    /// Base URL of the stub, e.g. `http://127.0.0.1:34567`.
    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Serve `body` for every request whose path equals `path`.
    pub fn route(&self, path: &str, body: impl Into<String>) {
        self.route_seq(path, vec![body.into()]);
    }

    /// Serve `bodies` in order for `path`; the last body repeats.
    pub fn route_seq(&self, path: &str, bodies: Vec<String>) {
        let mut bodies: VecDeque<String> = bodies.into();
        let last = bodies.back().cloned().unwrap_or_default();
        // Keep the last body out of the queue so it can repeat
        bodies.pop_back();
        self.routes.0.lock().unwrap().insert(
            path.to_string(),
            RouteEntry {
                bodies,
                last,
                requests: Vec::new(),
            },
        );
    }

    /// Number of requests seen for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.requests(path).len()
    }

    /// Full request targets (path + query) seen for `path`.
    pub fn requests(&self, path: &str) -> Vec<String> {
        self.routes
            .0
            .lock()
            .unwrap()
            .get(path)
            .map(|entry| entry.requests.clone())
            .unwrap_or_default()
    }
}

async fn handle_connection(mut stream: tokio::net::TcpStream, routes: Routes) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    // Read until the end of headers
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    // Drain the request body
    let mut body_read = buf.len() - (header_end + 4);
    while body_read < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body_read += n;
    }

    let target = headers
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let path = target.split('?').next().unwrap_or("/").to_string();

    let body = {
        let mut routes = routes.0.lock().unwrap();
        match routes.get_mut(&path) {
            Some(entry) => {
                entry.requests.push(target);
                Some(entry.bodies.pop_front().unwrap_or_else(|| entry.last.clone()))
            }
            None => None,
        }
    };

    let response = match body {
        Some(body) => format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ),
        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string(),
    };
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Config with every endpoint pointed at the stub.
pub fn test_config(base: &str) -> webwx_client::Config {
    let mut config = webwx_client::Config::default();
    config.endpoints.login_base = base.to_string();
    config.endpoints.qr_base = format!("{base}/qrcode/");
    config.endpoints.web_base = format!("{base}/cgi-bin/mmwebwx-bin");
    config.endpoints.push_base = format!("{base}/cgi-bin/mmwebwx-bin");
    config.login.poll_interval_secs = 1;
    config.login.deadline_secs = 5;
    config
}

/// Canned bodies mirroring the remote service's formats.
pub mod bodies {
    pub const UUID: &str = "4cSfW7wbZy==";

    pub fn jslogin_ok() -> String {
        format!("window.QRLogin.code = 200; window.QRLogin.uuid = \"{UUID}\";")
    }

    pub fn jslogin_refused() -> String {
        "window.QRLogin.code = 400;".to_string()
    }

    pub fn login_pending() -> String {
        "window.code=408;".to_string()
    }

    pub fn login_success(base: &str) -> String {
        format!(
            "window.code=200;\nwindow.redirect_uri=\"{base}/cgi-bin/mmwebwx-bin/webwxnewloginpage?ticket=Axy&uuid={UUID}&scan=1\";"
        )
    }

    pub fn redirect_xml() -> String {
        "<error><ret>0</ret><message>OK</message><skey>@crypt_s</skey>\
         <wxsid>sid42</wxsid><wxuin>777</wxuin><pass_ticket>pt42</pass_ticket></error>"
            .to_string()
    }

    pub fn init_ok() -> String {
        r#"{
            "BaseResponse": {"Ret": 0, "ErrMsg": ""},
            "User": {"UserName": "@me", "NickName": "Me"},
            "ContactList": [{"UserName": "@friend", "NickName": "Friend"}],
            "ChatSet": "@friend,@extra",
            "SyncKey": {"Count": 2, "List": [{"Key": 1, "Val": 100}, {"Key": 2, "Val": 200}]},
            "SKey": "@crypt_s"
        }"#
        .to_string()
    }

    pub fn contacts_ok() -> String {
        r#"{
            "BaseResponse": {"Ret": 0, "ErrMsg": ""},
            "MemberCount": 4,
            "MemberList": [
                {"UserName": "@@group1", "NickName": "Group One"},
                {"UserName": "@friend", "NickName": "Friend"},
                {"UserName": "@extra", "NickName": "Extra", "Signature": "sig"},
                {"UserName": "@official", "NickName": "Official", "VerifyFlag": 8}
            ],
            "Seq": 0
        }"#
        .to_string()
    }

    pub fn send_ok() -> String {
        r#"{"BaseResponse": {"Ret": 0, "ErrMsg": ""}, "MsgID": "1", "LocalID": "1"}"#.to_string()
    }

    pub fn upload_ok() -> String {
        r#"{"BaseResponse": {"Ret": 0, "ErrMsg": ""}, "MediaId": "@media123"}"#.to_string()
    }

    pub fn upload_refused() -> String {
        r#"{"BaseResponse": {"Ret": 1, "ErrMsg": "upload refused"}}"#.to_string()
    }

    pub fn sync_check_ok() -> String {
        r#"window.synccheck={retcode:"0",selector:"2"}"#.to_string()
    }

    pub fn sync_check_invalid() -> String {
        r#"window.synccheck={retcode:"1101",selector:"0"}"#.to_string()
    }
}
