/*!
Builders for NFM-T shaped JSON documents

Produce the raw documents the REST API returns, so tests go through the same
decoding as production.
*/

use chrono::{DateTime, Utc};
use otsloss_core::models::{OTS_CONNECTION_TYPE, RECEIVE_POWER_METRIC};
use otsloss_core::reconciler::{FAR_END_SUFFIX, PM_TIME_FORMAT};
use serde_json::{json, Map, Value};

/// Fluent builder for one `physicalConns` entry
#[derive(Debug, Clone)]
pub struct PhysicalConnBuilder {
    payload: Map<String, Value>,
}

impl PhysicalConnBuilder {
    fn set<V: Into<String>>(mut self, field: &str, value: V) -> Self {
        self.payload
            .insert(field.to_string(), Value::String(value.into()));
        self
    }

    pub fn a_port<V: Into<String>>(self, label: V) -> Self {
        self.set("aPortLabel", label)
    }

    pub fn z_port<V: Into<String>>(self, label: V) -> Self {
        self.set("zPortLabel", label)
    }

    pub fn a2_port<V: Into<String>>(self, label: V) -> Self {
        self.set("a2PortLabel", label)
    }

    pub fn z2_port<V: Into<String>>(self, label: V) -> Self {
        self.set("z2PortLabel", label)
    }

    pub fn connection_type<V: Into<String>>(self, kind: V) -> Self {
        self.set("wdmConnectionType", kind)
    }

    pub fn build(self) -> Value {
        Value::Object(self.payload)
    }
}

/// OTS connection with the given id and display label and no port labels yet
pub fn ots_connection(id: i64, label: &str) -> PhysicalConnBuilder {
    let mut payload = Map::new();
    payload.insert("id".into(), json!(id));
    payload.insert("guiLabel".into(), json!(label));
    payload.insert("wdmConnectionType".into(), json!(OTS_CONNECTION_TYPE));
    PhysicalConnBuilder { payload }
}

/// Raman-amplified OTS whose far-end ports are `{label}/Z2-RA2P-LINEIN` and
/// `{label}/Z-RA2P-LINEIN`
pub fn raman_ots(id: i64, label: &str) -> PhysicalConnBuilder {
    ots_connection(id, label)
        .a_port(format!("{}/A-LD", label))
        .a2_port(format!("{}/A2-LD", label))
        .z_port(format!("{}/Z-RA2P-LINEIN", label))
        .z2_port(format!("{}/Z2-RA2P-LINEIN", label))
}

/// One `fiberCharacteristic` entry
pub fn fiber_core(from: &str, to: &str, egress: &str, ingress: &str, raman_gain: &str) -> Value {
    json!({
        "fromLabel": from,
        "toLabel": to,
        "egressPowerOut": egress,
        "ingressPowerIn": ingress,
        "targetGainStr": raman_gain
    })
}

/// One PM row: `Time` plus a value per port key
pub fn pm_row(time: &str, values: &[(&str, &str)]) -> Value {
    let mut row = Map::new();
    row.insert("Time".into(), json!(time));
    for (port, value) in values {
        row.insert((*port).to_string(), json!(value));
    }
    Value::Object(row)
}

/// Key under which a far-end network element reports `port`
pub fn far_end_key(port: &str) -> String {
    format!("{}{}", port, FAR_END_SUFFIX)
}

/// PM query response with `rows` under the receive-power metric
pub fn pm_response(rows: Vec<Value>) -> Value {
    let mut graphs = Map::new();
    graphs.insert(RECEIVE_POWER_METRIC.to_string(), json!({ "pmdata": rows }));
    json!({
        "objGraphDataMap": [
            { "graphDataMap": graphs }
        ]
    })
}

/// PM query response for an object that was never collected
pub fn empty_pm_response() -> Value {
    json!({ "objGraphDataMap": [] })
}

/// Formats a time the way PM rows carry it
pub fn pm_time(at: DateTime<Utc>) -> String {
    at.format(PM_TIME_FORMAT).to_string()
}
