use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, to_vec};

use crate::report::CreationReport;
use crate::transport::{
    ApiError, ApiFuture, ApiRequest, ApiResponse, ApiResult, BodyBytes, Transport, TransportState,
};

/// Scripted behavior for one transport execution, consumed front-to-back.
#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    #[default]
    Pass,
    ConnectError {
        reason: String,
    },
    SendError {
        reason: String,
    },
    ReceiveError {
        reason: String,
    },
    InternalError {
        reason: String,
    },
}

impl MockBehavior {
    pub fn pass() -> Self {
        Self::Pass
    }

    pub fn connect_error(reason: impl Into<String>) -> Self {
        Self::ConnectError {
            reason: reason.into(),
        }
    }

    pub fn send_error(reason: impl Into<String>) -> Self {
        Self::SendError {
            reason: reason.into(),
        }
    }

    pub fn receive_error(reason: impl Into<String>) -> Self {
        Self::ReceiveError {
            reason: reason.into(),
        }
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::InternalError {
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockBehaviorPlan {
    request: VecDeque<MockBehavior>,
}

impl MockBehaviorPlan {
    pub fn push(&mut self, behavior: MockBehavior) -> &mut Self {
        self.request.push_back(behavior);
        self
    }

    fn pop(&mut self) -> MockBehavior {
        self.request.pop_front().unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.request.len()
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, BodyBytes)>,
    pub body: BodyBytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<BodyBytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<BodyBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
    }

    pub fn json<T: Serialize>(status: u16, payload: &T) -> ApiResult<Self> {
        let body = to_vec(payload).map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(Self::new(status, body))
    }
}

#[derive(Clone, Debug)]
pub struct MockSnapshot {
    pub state: TransportState,
    pub request_count: usize,
    pub last_url: Option<String>,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
    pub behavior_remaining: usize,
    pub response_queue_len: usize,
    pub route_queue_len: usize,
    pub outbound_count: usize,
    pub inbound_count: usize,
    pub elapsed_total: Duration,
}

#[derive(Debug)]
struct MockTransportState {
    state: TransportState,
    request_count: usize,
    last_url: Option<String>,
    last_status: Option<u16>,
    last_error: Option<String>,
    behavior_plan: MockBehaviorPlan,
    default_response_queue: VecDeque<MockResponse>,
    route_response_queues: HashMap<(Method, String), VecDeque<MockResponse>>,
    outbound_log: Vec<ApiRequest>,
    inbound_log: Vec<ApiResponse>,
    elapsed_total: Duration,
}

impl Default for MockTransportState {
    fn default() -> Self {
        Self {
            state: TransportState::Idle,
            request_count: 0,
            last_url: None,
            last_status: None,
            last_error: None,
            behavior_plan: MockBehaviorPlan::default(),
            default_response_queue: VecDeque::new(),
            route_response_queues: HashMap::new(),
            outbound_log: Vec::new(),
            inbound_log: Vec::new(),
            elapsed_total: Duration::from_millis(0),
        }
    }
}

impl MockTransportState {
    fn snapshot(&self) -> MockSnapshot {
        MockSnapshot {
            state: self.state,
            request_count: self.request_count,
            last_url: self.last_url.clone(),
            last_status: self.last_status,
            last_error: self.last_error.clone(),
            behavior_remaining: self.behavior_plan.len(),
            response_queue_len: self.default_response_queue.len(),
            route_queue_len: self.route_response_queues.values().map(VecDeque::len).sum(),
            outbound_count: self.outbound_log.len(),
            inbound_count: self.inbound_log.len(),
            elapsed_total: self.elapsed_total,
        }
    }
}

/// In-memory transport: no sockets, responses come from queues, failures
/// come from the behavior plan. An empty queue answers 200 with an empty
/// body so tests only script what they assert on.
#[derive(Clone, Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockTransportState::default())),
        }
    }

    pub fn with_behavior_plan(behavior_plan: MockBehaviorPlan) -> Self {
        let transport = Self::new();
        transport
            .state
            .lock()
            .expect("mock transport mutex poisoned while installing behavior plan")
            .behavior_plan = behavior_plan;
        transport
    }

    pub fn snapshot(&self) -> MockSnapshot {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while taking snapshot")
            .snapshot()
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while queueing response")
            .default_response_queue
            .push_back(response);
    }

    pub fn queue_response_for(
        &self,
        method: Method,
        url: impl Into<String>,
        response: MockResponse,
    ) {
        let key = (method, url.into());
        self.state
            .lock()
            .expect("mock transport mutex poisoned while queueing response by route")
            .route_response_queues
            .entry(key)
            .or_default()
            .push_back(response);
    }

    pub fn queue_post_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::POST, url, response);
    }

    pub fn queue_get_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::GET, url, response);
    }

    /// Outbound requests as recorded, in execution order.
    pub fn outbound_log(&self) -> Vec<ApiRequest> {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while reading outbound log")
            .outbound_log
            .clone()
    }

    pub fn outbound_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while reading outbound count")
            .outbound_log
            .len()
    }

    pub fn inbound_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while reading inbound count")
            .inbound_log
            .len()
    }

    pub fn clear_logs(&self) {
        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while clearing logs");
        state.outbound_log.clear();
        state.inbound_log.clear();
    }

    fn pop_behavior(&self) -> MockBehavior {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while reading behavior plan")
            .behavior_plan
            .pop()
    }

    fn next_response(&self, request: &ApiRequest) -> Option<MockResponse> {
        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while selecting response");
        let route_key = (request.method.clone(), request.url.clone());
        if let Some(queue) = state.route_response_queues.get_mut(&route_key) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }
        state.default_response_queue.pop_front()
    }

    fn fail(&self, error: ApiError) -> ApiError {
        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while recording error");
        state.state = TransportState::Error;
        state.last_error = Some(error.to_string());
        state.last_status = error.status_code();
        error
    }

    fn record_inbound(&self, response: &ApiResponse) {
        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while recording inbound response");
        state.inbound_log.push(response.clone());
        state.last_status = Some(response.status);
        state.state = TransportState::Idle;
        state.elapsed_total += response.elapsed;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: ApiRequest) -> ApiFuture<ApiResult<ApiResponse>> {
        let transport = self.clone();
        Box::pin(async move {
            let behavior = transport.pop_behavior();
            let start = Instant::now();

            {
                let mut state = transport
                    .state
                    .lock()
                    .expect("mock transport mutex poisoned while recording outbound request");
                state.outbound_log.push(request.clone());
                state.request_count += 1;
                state.last_url = Some(request.url.clone());
                state.state = TransportState::Busy;
                state.last_error = None;
            }

            match behavior {
                MockBehavior::ConnectError { reason } => {
                    return Err(transport.fail(ApiError::connect(reason)));
                }
                MockBehavior::SendError { reason } => {
                    return Err(transport.fail(ApiError::send(reason)));
                }
                MockBehavior::ReceiveError { reason } => {
                    return Err(transport.fail(ApiError::receive(reason)));
                }
                MockBehavior::InternalError { reason } => {
                    return Err(transport.fail(ApiError::internal(reason)));
                }
                MockBehavior::Pass => {}
            }

            let response = match transport.next_response(&request) {
                Some(response) => ApiResponse {
                    status: response.status,
                    headers: response.headers,
                    body: response.body,
                    elapsed: start.elapsed(),
                },
                None => ApiResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: Bytes::new(),
                    elapsed: start.elapsed(),
                },
            };

            transport.record_inbound(&response);
            Ok(response)
        })
    }
}

/// Outcome recorded by [`CapturingReport`].
#[derive(Clone, Debug)]
pub enum ReportEvent {
    Created(Value),
    Failed(ApiError),
}

/// Report sink that stores every outcome for assertion.
#[derive(Clone, Debug, Default)]
pub struct CapturingReport {
    events: Arc<Mutex<Vec<ReportEvent>>>,
}

impl CapturingReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events
            .lock()
            .expect("capturing report mutex poisoned while reading events")
            .clone()
    }

    pub fn created(&self) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::Created(payload) => Some(payload),
                ReportEvent::Failed(_) => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<ApiError> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::Failed(error) => Some(error),
                ReportEvent::Created(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CreationReport for CapturingReport {
    fn created(&self, payload: &Value) {
        self.events
            .lock()
            .expect("capturing report mutex poisoned while recording success")
            .push(ReportEvent::Created(payload.clone()));
    }

    fn failed(&self, error: &ApiError) {
        self.events
            .lock()
            .expect("capturing report mutex poisoned while recording failure")
            .push(ReportEvent::Failed(error.clone()));
    }
}
