//! PM sample reconciliation.
//!
//! A PM query returns, for one OTS object, rows of receive-power samples over
//! the lookback window. Each row carries a `Time` key plus one key per port.
//! For every requested port the reconciler keeps the most recent non-empty
//! sample and parses it.
//!
//! The same physical port shows up under two keys depending on which network
//! element answered: the bare label, or the label followed by `(Z End)`. Both
//! keys are treated as the same port.

use crate::error::{LossError, Result};
use crate::models::Connection;
use crate::telemetry::{PmWindow, TelemetryClient};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Suffix some network elements append to far-end port keys
pub const FAR_END_SUFFIX: &str = "(Z End)";

/// Layout of the `Time` key in PM rows (minute precision, UTC)
pub const PM_TIME_FORMAT: &str = "%m/%d/%Y %H:%M";

const TIME_KEY: &str = "Time";

/// One port observation from a PM row
#[derive(Debug, Clone, PartialEq)]
pub struct PmSample {
    pub port: String,
    /// Raw value; empty when the interval has no measurement
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl PmSample {
    pub fn has_value(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// Parsed power of one port and the time of the sample it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-port readings of one connection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledPower {
    readings: HashMap<String, PowerReading>,
    freshness: Option<DateTime<Utc>>,
}

impl ReconciledPower {
    pub fn get(&self, port: &str) -> Option<&PowerReading> {
        self.readings.get(port)
    }

    /// Sample time of the first requested port that resolved
    pub fn freshness(&self) -> Option<DateTime<Utc>> {
        self.freshness
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn insert(&mut self, port: &str, reading: PowerReading) {
        self.freshness.get_or_insert(reading.timestamp);
        self.readings.insert(port.to_string(), reading);
    }
}

/// Outcome of reconciling one connection
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Available(ReconciledPower),
    /// Nothing was measured for this connection in the window
    Unavailable,
}

pub fn parse_pm_time(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), PM_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| LossError::MalformedTimestamp(raw.to_string()))
}

/// Flattens PM rows into samples, one per port key.
pub fn samples_from_rows(rows: &[Map<String, Value>]) -> Result<Vec<PmSample>> {
    let mut samples = Vec::new();
    for row in rows {
        let time = match row.get(TIME_KEY) {
            Some(Value::String(raw)) => parse_pm_time(raw)?,
            Some(other) => return Err(LossError::MalformedTimestamp(other.to_string())),
            None => return Err(LossError::MissingSampleTime),
        };
        for (key, value) in row {
            if key == TIME_KEY {
                continue;
            }
            samples.push(PmSample {
                port: key.clone(),
                value: raw_value(value),
                timestamp: time,
            });
        }
    }
    Ok(samples)
}

fn raw_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_port_key(key: &str, port: &str) -> bool {
    key == port
        || key
            .strip_prefix(port)
            .is_some_and(|rest| rest == FAR_END_SUFFIX)
}

/// Latest non-empty sample reported for `port` under either key.
///
/// Equal timestamps prefer the bare key, then the greater raw value, so the
/// choice does not depend on the order of `samples`.
pub fn select_latest<'a>(samples: &'a [PmSample], port: &str) -> Option<&'a PmSample> {
    samples
        .iter()
        .filter(|sample| is_port_key(&sample.port, port) && sample.has_value())
        .max_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| (a.port == port).cmp(&(b.port == port)))
                .then_with(|| a.value.cmp(&b.value))
        })
}

/// Picks and parses one reading per port of `ports`.
///
/// Ports with only empty samples are left out. When no port resolves, or
/// there were no samples at all, the connection is `Unavailable`. A chosen
/// value that is not a number is a corrupt feed and fails the run.
pub fn reconcile(
    connection_label: &str,
    samples: &[PmSample],
    ports: &[&str],
) -> Result<Reconciliation> {
    if samples.is_empty() {
        return Ok(Reconciliation::Unavailable);
    }

    let mut power = ReconciledPower::default();
    for port in ports.iter().filter(|port| !port.is_empty()) {
        let Some(sample) = select_latest(samples, port) else {
            debug!("No PM value for {} on OTS {}", port, connection_label);
            continue;
        };
        let value = sample
            .value
            .trim()
            .parse::<f64>()
            .map_err(|_| LossError::InvalidNumber {
                field: "receive power",
                value: sample.value.clone(),
                connection: connection_label.to_string(),
                port: port.to_string(),
            })?;
        power.insert(
            port,
            PowerReading {
                value,
                timestamp: sample.timestamp,
            },
        );
    }

    if power.is_empty() {
        Ok(Reconciliation::Unavailable)
    } else {
        Ok(Reconciliation::Available(power))
    }
}

/// Queries the PM series of `object_id` and reconciles the far-end ports of
/// `connection`.
pub async fn reconcile_connection<C: TelemetryClient>(
    client: &C,
    connection: &Connection,
    object_id: &str,
    window: PmWindow,
) -> Result<Reconciliation> {
    let ports = connection.far_end_ports();
    for port in &ports {
        info!("Retrieving the RX Power on {}", port);
    }

    let response = client.fetch_pm_series(object_id, window).await?;
    let rows = response.receive_power_rows();
    if rows.is_empty() {
        warn!("PM Data not found for {} - {}", ports[0], ports[1]);
        return Ok(Reconciliation::Unavailable);
    }

    let samples = samples_from_rows(rows)?;
    let outcome = reconcile(&connection.gui_label, &samples, &ports)?;
    match &outcome {
        Reconciliation::Available(power) => {
            if let Some(at) = power.freshness() {
                info!(
                    "Used the PM data at: {} UTC for OTS {}",
                    at.format(PM_TIME_FORMAT),
                    connection.gui_label
                );
            }
        }
        Reconciliation::Unavailable => {
            warn!("PM Data not found for {} - {}", ports[0], ports[1]);
        }
    }
    Ok(outcome)
}
