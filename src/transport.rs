use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::Client as ReqwestClient;
use reqwest::header::HeaderValue;
use serde::de::DeserializeOwned;
use serde_json::from_slice;
use thiserror::Error;

pub use reqwest::Method;

pub type BodyBytes = Bytes;
pub type ApiFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
pub type ApiResult<T> = Result<T, ApiError>;

/// Transport state a mock can mirror (optional for callers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Busy,
    Error,
}

/// Stage at which a request failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Connect,
    Send,
    Receive,
    Status,
    Parse,
    Internal,
}

#[derive(Clone, Debug, Error)]
#[error("api error {kind:?} status={status:?} {message}")]
pub struct ApiError {
    kind: ApiErrorKind,
    status: Option<u16>,
    message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Connect, None, message)
    }

    pub fn send(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Send, None, message)
    }

    pub fn receive(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Receive, None, message)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Status, Some(status), body)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, None, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Internal, None, message)
    }

    /// Maps a reqwest failure to the stage it occurred in. Connection-level
    /// failures override the stage kind so "server not running" is
    /// distinguishable from a request that died mid-flight.
    pub(crate) fn from_reqwest(kind: ApiErrorKind, err: reqwest::Error) -> Self {
        let kind = if err.is_connect() { ApiErrorKind::Connect } else { kind };
        let status = err.status().map(|s| s.as_u16());
        Self::new(kind, status, err.to_string())
    }

    pub(crate) fn from_serde(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, BodyBytes)>,
    pub body: Option<BodyBytes>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<BodyBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<BodyBytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, BodyBytes)>,
    pub body: BodyBytes,
    pub elapsed: Duration,
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        from_slice(&self.body).map_err(ApiError::from_serde)
    }
}

/// Seam between the client and the network. The production implementation
/// is [`ReqwestTransport`]; tests swap in [`crate::mock::MockTransport`].
pub trait Transport: Send + Sync {
    fn execute(&self, request: ApiRequest) -> ApiFuture<ApiResult<ApiResponse>>;
}

pub type SharedTransport = Arc<dyn Transport>;

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: ReqwestClient::new(),
        }
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: ApiRequest) -> ApiFuture<ApiResult<ApiResponse>> {
        let client = self.client.clone();
        Box::pin(async move {
            let start = Instant::now();
            let mut req = client.request(request.method.clone(), &request.url);

            for (key, value) in request.headers {
                let value = HeaderValue::from_bytes(value.as_ref())
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                req = req.header(key, value);
            }

            if let Some(body) = request.body {
                req = req.body(body);
            }

            if let Some(timeout) = request.timeout {
                req = req.timeout(timeout);
            }

            let resp = req
                .send()
                .await
                .map_err(|err| ApiError::from_reqwest(ApiErrorKind::Send, err))?;

            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), Bytes::copy_from_slice(value.as_ref())))
                .collect();
            let body = resp
                .bytes()
                .await
                .map_err(|err| ApiError::from_reqwest(ApiErrorKind::Receive, err))?;
            let elapsed = start.elapsed();

            Ok(ApiResponse {
                status,
                headers,
                body,
                elapsed,
            })
        })
    }
}
