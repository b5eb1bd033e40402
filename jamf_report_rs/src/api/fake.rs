//! Test doubles: an in-memory transport, and a loopback HTTP server for
//! exercising the real transport and session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::Transport;
use crate::error::ApiError;

#[derive(Debug, Clone)]
enum Canned {
    Json(Value),
    NotFound,
    Unavailable,
    Auth,
}

/// Serves canned responses by exact path. Unknown paths answer 404.
#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: HashMap<String, Canned>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, path: &str, body: Value) -> Self {
        self.responses.insert(path.to_string(), Canned::Json(body));
        self
    }

    pub fn not_found(mut self, path: &str) -> Self {
        self.responses.insert(path.to_string(), Canned::NotFound);
        self
    }

    pub fn unavailable(mut self, path: &str) -> Self {
        self.responses.insert(path.to_string(), Canned::Unavailable);
        self
    }

    pub fn auth_failure(mut self, path: &str) -> Self {
        self.responses.insert(path.to_string(), Canned::Auth);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }
}

impl Transport for FakeTransport {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(path.to_string());
        match self.responses.get(path) {
            Some(Canned::Json(body)) => Ok(body.clone()),
            Some(Canned::Unavailable) => Err(ApiError::Transient {
                path: path.to_string(),
                attempts: 5,
                reason: "HTTP 503".into(),
            }),
            Some(Canned::Auth) => Err(ApiError::Auth("token expired".into())),
            Some(Canned::NotFound) | None => Err(ApiError::NotFound {
                path: path.to_string(),
            }),
        }
    }
}

/// One canned HTTP answer.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// Token payload that stays valid for the whole test.
    pub fn token(value: &str) -> Self {
        Self::json(serde_json::json!({
            "token": value,
            "expires": "2099-01-01T00:00:00Z"
        }))
    }
}

type Routes = HashMap<String, Vec<Reply>>;

/// HTTP/1.1 server on a loopback port.
///
/// Each path (query included) answers from its list of replies in order and
/// repeats the last one once the list runs out. Unknown paths answer 404.
pub struct StubServer {
    base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<(&str, Vec<Reply>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let routes: Arc<Routes> = Arc::new(
            routes
                .into_iter()
                .map(|(path, replies)| (path.to_string(), replies))
                .collect(),
        );
        let hits = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn({
            let hits = Arc::clone(&hits);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(answer(stream, Arc::clone(&routes), Arc::clone(&hits)));
                }
            }
        });
        Self {
            base_url,
            hits,
            task,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(mut stream: TcpStream, routes: Arc<Routes>, hits: Arc<Mutex<Vec<String>>>) {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&head);
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

    let reply = {
        let mut hits = hits.lock().unwrap();
        let served = hits.iter().filter(|p| **p == path).count();
        hits.push(path.clone());
        routes
            .get(&path)
            .and_then(|replies| replies.get(served).or_else(|| replies.last()))
            .cloned()
            .unwrap_or_else(|| Reply::status(404))
    };

    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reply.body.len(),
        reply.body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
