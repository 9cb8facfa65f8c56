//! Typed records for the NFM-T documents the engine consumes, plus the
//! report row it produces.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// `wdmConnectionType` of transport-line (OTS) physical connections
pub const OTS_CONNECTION_TYPE: &str = "WdmPortType_ots";

/// Graph key of the receive-end average optical power channel in a PM query
pub const RECEIVE_POWER_METRIC: &str = "OPIN/TOPR-AVG (Receive/NEND)";

/// Raman gain reported by cores without a Raman amplifier
pub const RAMAN_GAIN_NOT_APPLICABLE: &str = "N.A.";

/// One physical connection from `/data/npr/physicalConns`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: i64,
    #[serde(default)]
    pub gui_label: String,
    #[serde(default)]
    pub a_port_label: String,
    #[serde(default)]
    pub z_port_label: String,
    #[serde(default)]
    pub a2_port_label: String,
    #[serde(default)]
    pub z2_port_label: String,
    #[serde(default)]
    pub wdm_connection_type: String,
}

impl Connection {
    pub fn is_ots(&self) -> bool {
        self.wdm_connection_type == OTS_CONNECTION_TYPE
    }

    pub fn port_labels(&self) -> [&str; 4] {
        [
            &self.a_port_label,
            &self.z_port_label,
            &self.a2_port_label,
            &self.z2_port_label,
        ]
    }

    /// Far-end ports whose line-in power is read from PM, secondary first.
    pub fn far_end_ports(&self) -> [&str; 2] {
        [&self.z2_port_label, &self.z_port_label]
    }
}

/// One core of an OTS from `/fiberCharacteristic`.
///
/// Power and gain fields stay raw until the calculator parses them; a field
/// the platform left out is `None` rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiberCore {
    #[serde(default)]
    pub from_label: String,
    #[serde(default)]
    pub to_label: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub egress_power_out: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ingress_power_in: Option<String>,
    #[serde(rename = "targetGainStr", default, deserialize_with = "lenient_string")]
    pub raman_gain: Option<String>,
}

/// Connection registered with the Next-Gen PM application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedConnection {
    #[serde(default)]
    pub cxn_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cxn_id: Option<String>,
}

/// Response of `/mncpm/connection/query`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PmQueryResponse {
    #[serde(default)]
    pub obj_graph_data_map: Vec<ObjectGraphData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectGraphData {
    #[serde(default)]
    pub graph_data_map: HashMap<String, PmSeries>,
}

/// Rows of one metric: each row holds `Time` plus one entry per port
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PmSeries {
    #[serde(default)]
    pub pmdata: Vec<Map<String, Value>>,
}

impl PmQueryResponse {
    /// Receive-power rows of the queried object, empty when the platform
    /// never collected the metric.
    pub fn receive_power_rows(&self) -> &[Map<String, Value>] {
        self.obj_graph_data_map
            .first()
            .and_then(|object| object.graph_data_map.get(RECEIVE_POWER_METRIC))
            .map(|series| series.pmdata.as_slice())
            .unwrap_or(&[])
    }
}

/// Raman gain of a core, `N.A.` when the span has no Raman amplifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RamanGain {
    NotApplicable,
    Gain(f64),
}

impl fmt::Display for RamanGain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RamanGain::NotApplicable => f.write_str(RAMAN_GAIN_NOT_APPLICABLE),
            RamanGain::Gain(gain) => write!(f, "{}", gain),
        }
    }
}

impl Serialize for RamanGain {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One report row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossRecord {
    pub connection: String,
    pub egress_port: String,
    pub egress_power: f64,
    pub ingress_port: String,
    pub ingress_power: f64,
    pub raman_gain: RamanGain,
    pub total_loss: f64,
}

/// Accepts a JSON string, number or null; NFM-T is not consistent about it.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
