/*!
In-memory NFM-T client for tests

Serves the documents registered on it as raw JSON, decodes them on each fetch
the way the real client does, and records every call for assertions.
*/

use crate::fixtures::empty_pm_response;
use otsloss_core::state::{new_state, Shared};
use otsloss_core::telemetry::{PmWindow, TelemetryClient};
use otsloss_core::{Connection, FiberCore, LossError, ManagedConnection, PmQueryResponse, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Operation of the telemetry seam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockEndpoint {
    Inventory,
    Characteristics,
    ManagedConnections,
    PmSeries,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Inventory,
    Characteristics(i64),
    ManagedConnections,
    PmSeries { object_id: String, window: PmWindow },
}

impl MockCall {
    pub fn endpoint(&self) -> MockEndpoint {
        match self {
            MockCall::Inventory => MockEndpoint::Inventory,
            MockCall::Characteristics(_) => MockEndpoint::Characteristics,
            MockCall::ManagedConnections => MockEndpoint::ManagedConnections,
            MockCall::PmSeries { .. } => MockEndpoint::PmSeries,
        }
    }

    fn describe(&self) -> String {
        match self {
            MockCall::Inventory => "GET /data/npr/physicalConns".to_string(),
            MockCall::Characteristics(id) => {
                format!("GET /data/npr/physicalConns/{}/fiberCharacteristic", id)
            }
            MockCall::ManagedConnections => "POST /mncpm/mdcxnlist/".to_string(),
            MockCall::PmSeries { object_id, .. } => {
                format!("POST /mncpm/connection/query ({})", object_id)
            }
        }
    }
}

#[derive(Default)]
struct MockState {
    inventory: Vec<Value>,
    characteristics: HashMap<i64, Value>,
    managed: Vec<Value>,
    pm_series: HashMap<String, Value>,
    delays: HashMap<i64, Duration>,
    failures: HashMap<MockEndpoint, u16>,
    calls: Vec<MockCall>,
}

/// Mock telemetry client standing in for the NFM-T REST agent
#[derive(Clone)]
pub struct MockTelemetryClient {
    state: Shared<MockState>,
}

impl MockTelemetryClient {
    pub fn new() -> Self {
        Self {
            state: new_state(MockState::default()),
        }
    }

    /// Adds one `physicalConns` entry
    pub fn add_connection(&self, connection: Value) -> &Self {
        self.state.lock().inventory.push(connection);
        self
    }

    /// Sets the `fiberCharacteristic` array of a connection
    pub fn set_characteristics(&self, connection_id: i64, cores: Value) -> &Self {
        self.state.lock().characteristics.insert(connection_id, cores);
        self
    }

    /// Registers a connection with the PM application
    pub fn add_managed(&self, cxn_name: &str, cxn_id: &str) -> &Self {
        self.state
            .lock()
            .managed
            .push(json!({"cxnName": cxn_name, "cxnId": cxn_id}));
        self
    }

    /// Sets the PM query response of an object
    pub fn set_pm_series(&self, object_id: &str, response: Value) -> &Self {
        self.state
            .lock()
            .pm_series
            .insert(object_id.to_string(), response);
        self
    }

    /// Delays the characteristics answer of a connection
    pub fn delay_connection(&self, connection_id: i64, delay: Duration) -> &Self {
        self.state.lock().delays.insert(connection_id, delay);
        self
    }

    /// Makes every call to `endpoint` answer with an HTTP error status
    pub fn fail(&self, endpoint: MockEndpoint, status: u16) -> &Self {
        self.state.lock().failures.insert(endpoint, status);
        self
    }

    /// Recorded calls, in arrival order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, endpoint: MockEndpoint) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.endpoint() == endpoint)
            .count()
    }

    /// Forgets the recorded calls, keeping the registered documents
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn respond<T>(&self, call: MockCall, build: impl FnOnce(&MockState) -> Value) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let description = call.describe();
        let value = {
            let mut state = self.state.lock();
            state.calls.push(call.clone());
            if let Some(status) = state.failures.get(&call.endpoint()) {
                log::warn!("[MOCK] {} -> HTTP {}", description, status);
                return Err(LossError::Status {
                    call: description,
                    status: *status,
                });
            }
            build(&*state)
        };

        log::debug!("[MOCK] {}", description);
        serde_json::from_value(value).map_err(|source| LossError::Decode {
            call: description,
            source,
        })
    }
}

impl Default for MockTelemetryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryClient for MockTelemetryClient {
    fn fetch_inventory(&self) -> impl Future<Output = Result<Vec<Connection>>> + Send {
        let result = self.respond(MockCall::Inventory, |state| {
            Value::Array(state.inventory.clone())
        });
        async move { result }
    }

    fn fetch_characteristics(
        &self,
        connection_id: i64,
    ) -> impl Future<Output = Result<Vec<FiberCore>>> + Send {
        let delay = self.state.lock().delays.get(&connection_id).copied();
        let result = self.respond(MockCall::Characteristics(connection_id), |state| {
            state
                .characteristics
                .get(&connection_id)
                .cloned()
                .unwrap_or_else(|| json!([]))
        });
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    fn fetch_managed_connections(
        &self,
    ) -> impl Future<Output = Result<Vec<ManagedConnection>>> + Send {
        let result = self.respond(MockCall::ManagedConnections, |state| {
            Value::Array(state.managed.clone())
        });
        async move { result }
    }

    fn fetch_pm_series(
        &self,
        object_id: &str,
        window: PmWindow,
    ) -> impl Future<Output = Result<PmQueryResponse>> + Send {
        let call = MockCall::PmSeries {
            object_id: object_id.to_string(),
            window,
        };
        let result = self.respond(call, |state| {
            state
                .pm_series
                .get(object_id)
                .cloned()
                .unwrap_or_else(empty_pm_response)
        });
        async move { result }
    }
}
