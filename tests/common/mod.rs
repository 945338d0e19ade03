#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tiny_http::{Header, Response, Server};

/// What the fake upstream saw for one request.
#[derive(Debug, Clone)]
pub struct Seen {
    pub url: String,
    pub user_agent: Option<String>,
}

pub struct Canned {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Canned {
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: "<html>nope</html>".into(),
            delay: None,
        }
    }

    pub fn text(body: &str) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: None,
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A stand-in for the upstream API on an ephemeral port.
pub struct FakeUpstream {
    server: Arc<Server>,
    pub base_url: String,
    pub seen: Arc<Mutex<Vec<Seen>>>,
}

impl FakeUpstream {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Canned + Send + Sync + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind fake upstream"));
        let addr = server.server_addr().to_ip().expect("ip listener");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let accept = server.clone();
        let log = seen.clone();
        thread::spawn(move || {
            for request in accept.incoming_requests() {
                let handler = handler.clone();
                let log = log.clone();
                thread::spawn(move || {
                    let user_agent = request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("User-Agent"))
                        .map(|h| h.value.to_string());
                    let url = request.url().to_string();
                    log.lock().push(Seen {
                        url: url.clone(),
                        user_agent,
                    });
                    let canned = handler(&url);
                    if let Some(delay) = canned.delay {
                        thread::sleep(delay);
                    }
                    let response = Response::from_string(canned.body)
                        .with_status_code(canned.status)
                        .with_header(
                            Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                                .expect("valid header"),
                        );
                    let _ = request.respond(response);
                });
            }
        });

        Self {
            server,
            base_url: format!("http://{}/", addr),
            seen,
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.seen.lock().iter().map(|s| s.url.clone()).collect()
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

pub fn listing(children: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({"kind": "Listing", "data": {"children": children}})
}
