//! Shared fixtures for the client integration tests.
//!
//! - [`TestServer`]: an in-process hyper server on `127.0.0.1:0` whose replies
//!   come from a closure and whose requests are captured for assertions
//! - [`TestShard`]: a [`TestServer`] backed by an in-memory entity store
//! - [`MockTransport`]: a scripted [`Transport`] for tests that need exact
//!   control over every response, including transport failures

#![allow(dead_code)]

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use themis_client::{ClientConfig, HttpRequest, HttpResponse, Result, RetryConfig, Transport};
use tokio::net::TcpListener;

/// A request as seen by a test server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, `Null` when absent or not JSON.
    pub body: Value,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

pub enum Reply {
    Json(StatusCode, Value),
    Text(StatusCode, String),
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Json(StatusCode::OK, body)
    }

    pub fn json(status: u16, body: Value) -> Self {
        Reply::Json(StatusCode::from_u16(status).unwrap(), body)
    }

    pub fn status(status: u16) -> Self {
        Reply::Text(StatusCode::from_u16(status).unwrap(), String::new())
    }

    pub fn not_found() -> Self {
        Reply::json(404, json!({"error": "not found"}))
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let (status, body) = match self {
            Reply::Json(status, body) => (status, serde_json::to_vec(&body).unwrap()),
            Reply::Text(status, body) => (status, body.into_bytes()),
        };
        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }
}

type Handler = Arc<dyn Fn(&CapturedRequest) -> Reply + Send + Sync>;

/// Test HTTP server that runs on a separate task
pub struct TestServer {
    addr: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Starts a new test server on a random port
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&CapturedRequest) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handler: Handler = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let captured = requests.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let handler = handler.clone();
                                let captured = captured.clone();

                                tokio::spawn(async move {
                                    let service = service_fn(move |req| {
                                        let handler = handler.clone();
                                        let captured = captured.clone();
                                        async move { Self::handle(req, handler, captured).await }
                                    });

                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        eprintln!("Server error: {}", err);
                                    }
                                });
                            }
                            Err(err) => {
                                eprintln!("Accept error: {}", err);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    async fn handle(
        req: Request<Incoming>,
        handler: Handler,
        captured: Arc<Mutex<Vec<CapturedRequest>>>,
    ) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let headers = req
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_lowercase(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let whole_body = req.into_body().collect().await?.to_bytes();
        let body = serde_json::from_slice(&whole_body).unwrap_or(Value::Null);

        let request = CapturedRequest {
            method,
            path,
            headers,
            body,
        };
        let reply = handler(&request);
        captured.lock().unwrap().push(request);
        Ok(reply.into_response())
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Captured requests whose path starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<CapturedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Serves a fixed topology document listing `shards`.
pub async fn metadata_server(shards: Vec<String>) -> TestServer {
    TestServer::start(move |req| {
        if req.path == "/_admin/cluster/topology" {
            Reply::ok(json!({"version": 1, "shards": shards}))
        } else {
            Reply::not_found()
        }
    })
    .await
}

/// An in-memory shard speaking the entity, health and query APIs.
pub struct TestShard {
    pub server: TestServer,
    store: Arc<Mutex<BTreeMap<String, String>>>,
}

impl TestShard {
    pub async fn start() -> Self {
        let store: Arc<Mutex<BTreeMap<String, String>>> = Arc::new(Mutex::new(BTreeMap::new()));
        let shard_store = store.clone();
        let server = TestServer::start(move |req| Self::handle(req, &shard_store)).await;
        Self { server, store }
    }

    fn handle(req: &CapturedRequest, store: &Mutex<BTreeMap<String, String>>) -> Reply {
        let mut store = store.lock().unwrap();
        if let Some(key) = req.path.strip_prefix("/entities/") {
            return match req.method.as_str() {
                "GET" => match store.get(key) {
                    Some(blob) => Reply::ok(json!({"key": key, "blob": blob})),
                    None => Reply::not_found(),
                },
                "PUT" => match req.body.get("blob").and_then(Value::as_str) {
                    Some(blob) => {
                        let created = store.insert(key.to_string(), blob.to_string()).is_none();
                        Reply::json(if created { 201 } else { 200 }, json!({"success": true}))
                    }
                    None => Reply::json(400, json!({"error": "missing blob"})),
                },
                "DELETE" => match store.remove(key) {
                    Some(_) => Reply::ok(json!({"success": true})),
                    None => Reply::not_found(),
                },
                _ => Reply::status(405),
            };
        }
        match req.path.as_str() {
            "/health" => Reply::ok(json!({"status": "healthy"})),
            "/query/aql" => {
                let items: Vec<&String> = store.values().collect();
                Reply::ok(json!({"items": items, "has_more": false}))
            }
            _ => Reply::not_found(),
        }
    }

    pub fn base_url(&self) -> String {
        self.server.base_url()
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.lock().unwrap().keys().cloned().collect()
    }

    pub fn blob(&self, key: &str) -> Option<String> {
        self.store.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, blob: &str) {
        self.store
            .lock()
            .unwrap()
            .insert(key.to_string(), blob.to_string());
    }
}

/// Retry policy without backoff delays.
pub fn fast_retry(max_retries: usize) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        backoff_multiplier: 2.0,
    }
}

/// Config for `endpoints` with fast retries and a short timeout.
pub fn test_config<S: Into<String>>(endpoints: impl IntoIterator<Item = S>) -> ClientConfig {
    ClientConfig::new(endpoints)
        .with_retry(fast_retry(3))
        .with_timeout_ms(5_000)
}

type Script = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// A [`Transport`] whose responses come from a closure.
pub struct MockTransport {
    script: Script,
    calls: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Captured requests whose URL contains `fragment`.
    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(fragment))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest, _timeout: Duration) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.script)(&request)
    }
}

pub fn json_response(status: u16, body: Value) -> Result<HttpResponse> {
    Ok(HttpResponse::new(
        StatusCode::from_u16(status).unwrap(),
        serde_json::to_vec(&body).unwrap(),
    ))
}

/// JSON body of a captured mock request.
pub fn request_json(request: &HttpRequest) -> Value {
    request
        .body
        .as_ref()
        .map(|body| serde_json::from_slice(body).unwrap())
        .unwrap_or(Value::Null)
}
