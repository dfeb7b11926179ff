//! Client for a local items API: create an item with a single POST, report
//! the JSON payload or the error to a logging sink, fire-and-forget. Ships
//! an in-memory mock transport for fully deterministic tests.

pub mod client;
pub mod mock;
pub mod report;
pub mod transport;

pub use reqwest::Method;

pub use client::{BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_ITEM_NAME, ItemsClient};
pub use report::{ConsoleReport, CreationReport};
pub use transport::{
    ApiError, ApiErrorKind, ApiFuture, ApiRequest, ApiResponse, ApiResult, BodyBytes,
    ReqwestTransport, Transport, TransportState,
};

pub use mock::{
    CapturingReport, MockBehavior, MockBehaviorPlan, MockResponse, MockSnapshot, MockTransport,
    ReportEvent,
};
