use serde_json::Value;

use crate::transport::ApiError;

/// Sink for the outcome of a fire-and-forget item creation. The trigger
/// path reports exactly one of these per invocation and surfaces nothing
/// else to the caller.
pub trait CreationReport: Send + Sync {
    fn created(&self, payload: &Value);
    fn failed(&self, error: &ApiError);
}

/// Reports outcomes to the console through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleReport;

impl CreationReport for ConsoleReport {
    fn created(&self, payload: &Value) {
        tracing::info!(payload = %payload, "item created");
    }

    fn failed(&self, error: &ApiError) {
        tracing::error!(error = %error, "item creation failed");
    }
}
