use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

use crate::report::{ConsoleReport, CreationReport};
use crate::transport::{ApiError, ApiRequest, ApiResult, ReqwestTransport, Transport};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_ITEM_NAME: &str = "hello";

/// Environment variable consulted by [`ItemsClient::from_env`].
pub const BASE_URL_ENV: &str = "ITEMS_API_URL";

/// Client for the local items API. One domain operation: create an item by
/// POSTing its name as a query parameter. The response payload is opaque
/// JSON; its schema belongs to the server.
#[derive(Clone)]
pub struct ItemsClient {
    base_url: Url,
    transport: Arc<dyn Transport>,
    report: Arc<dyn CreationReport>,
}

impl ItemsClient {
    pub fn new() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            transport: Arc::new(ReqwestTransport::new()),
            report: Arc::new(ConsoleReport),
        }
    }

    pub fn with_transport<T>(transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self::new().transport(transport)
    }

    /// Reads the base URL from `ITEMS_API_URL`, falling back to the default
    /// endpoint when the variable is unset.
    pub fn from_env() -> ApiResult<Self> {
        match std::env::var(BASE_URL_ENV) {
            Ok(raw) => {
                let base_url = Url::parse(&raw)
                    .map_err(|err| ApiError::internal(format!("invalid {BASE_URL_ENV}: {err}")))?;
                Ok(Self::new().base_url(base_url))
            }
            Err(_) => Ok(Self::new()),
        }
    }

    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Arc::new(transport);
        self
    }

    pub fn report<R>(mut self, report: R) -> Self
    where
        R: CreationReport + 'static,
    {
        self.report = Arc::new(report);
        self
    }

    /// URL for the create-item operation. The name travels as a query pair
    /// and is percent-encoded by the `url` crate.
    pub fn create_item_url(&self, name: &str) -> ApiResult<Url> {
        let mut url = self
            .base_url
            .join("items")
            .map_err(|err| ApiError::internal(err.to_string()))?;
        url.query_pairs_mut().append_pair("name", name);
        Ok(url)
    }

    /// Awaitable form of item creation: POST with no headers and no body,
    /// reject non-2xx statuses, parse the body as JSON.
    pub async fn create_item(&self, name: &str) -> ApiResult<Value> {
        let url = self.create_item_url(name)?;
        let response = self.transport.execute(ApiRequest::post(url)).await?;

        if !response.is_success() {
            return Err(ApiError::status(
                response.status(),
                String::from_utf8_lossy(response.body()).into_owned(),
            ));
        }

        response.json::<Value>()
    }

    /// Fire-and-forget form. Spawns the operation and routes the outcome to
    /// the report sink; the returned handle carries no outcome value and may
    /// be dropped. Concurrent triggers are independent and unsynchronized.
    pub fn trigger_create_item(&self, name: &str) -> JoinHandle<()> {
        let client = self.clone();
        let name = name.to_owned();
        tokio::spawn(async move {
            match client.create_item(&name).await {
                Ok(payload) => client.report.created(&payload),
                Err(error) => client.report.failed(&error),
            }
        })
    }

    /// Triggers creation with the default name, reproducing
    /// `POST http://localhost:8000/items?name=hello` under default
    /// configuration.
    pub fn trigger_default(&self) -> JoinHandle<()> {
        self.trigger_create_item(DEFAULT_ITEM_NAME)
    }
}

impl Default for ItemsClient {
    fn default() -> Self {
        Self::new()
    }
}
