//! HTTP transport seam for the session client.
//!
//! The session client builds `HttpRequest` values and hands them to a
//! `Transport`. Production code uses `ReqwestTransport`; tests plug in a
//! scripted transport so the request lifecycle can be exercised without a
//! server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use super::ApiError;

/// Body of an outgoing request. Kept `Clone` so a request can be resent
/// after a credential refresh.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Pre-serialized JSON text
    Text(String),
    Multipart(MultipartForm),
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn into_form(self) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| ApiError::InvalidRequest(format!("bad content type: {}", e)))?;
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn authorization(&self) -> Option<&str> {
        self.header(header::AUTHORIZATION.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }

    /// Parse the body as JSON, `None` when it is not valid JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Transport over a pooled reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(value.to_string()),
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Multipart(form) => builder.multipart(form.into_form()?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for exercising the client without a server.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync;

    pub struct MockTransport {
        handler: Box<Handler>,
        delay: Duration,
        /// When set, only requests to this path are delayed
        delayed_path: Option<String>,
        sent: Mutex<Vec<HttpRequest>>,
        calls: AtomicUsize,
    }

    impl MockTransport {
        pub fn new<F>(handler: F) -> Arc<Self>
        where
            F: Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync + 'static,
        {
            Self::with_delay(Duration::ZERO, handler)
        }

        pub fn with_delay<F>(delay: Duration, handler: F) -> Arc<Self>
        where
            F: Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                handler: Box::new(handler),
                delay,
                delayed_path: None,
                sent: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        /// Delay only the requests sent to `path`.
        pub fn with_route_delay<F>(path: &str, delay: Duration, handler: F) -> Arc<Self>
        where
            F: Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                handler: Box::new(handler),
                delay,
                delayed_path: Some(path.to_string()),
                sent: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }

        pub fn sent_to(&self, path: &str) -> Vec<HttpRequest> {
            self.sent()
                .into_iter()
                .filter(|r| r.url.ends_with(path))
                .collect()
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(request.clone());
            }
            let delayed = match self.delayed_path {
                Some(ref path) => request.url.ends_with(path.as_str()),
                None => true,
            };
            if delayed && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.handler)(&request)
        }
    }

    pub fn json_response(status: u16, body: Value) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        })
    }

    pub fn bytes_response(
        status: u16,
        content_type: &str,
        body: &[u8],
    ) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            content_type: Some(content_type.to_string()),
            body: body.to_vec(),
        })
    }
}
