//! Fiber characteristics lookup.

use crate::calculator::PowerSource;
use crate::error::Result;
use crate::models::{Connection, FiberCore};
use crate::telemetry::TelemetryClient;
use tracing::{debug, info, warn};

/// Fetches the cores of `connection` in the order the platform returns them.
///
/// Missing power fields are kept as `None`; the calculator rejects them when
/// it parses the core. Only the fields `source` will read are reported.
pub async fn resolve_cores<C: TelemetryClient>(
    client: &C,
    connection: &Connection,
    source: PowerSource,
) -> Result<Vec<FiberCore>> {
    info!("Retrieving the Fiber Characteristics for OTS: {}", connection.gui_label);

    let cores = client.fetch_characteristics(connection.id).await?;

    for core in &cores {
        let missing = missing_power_fields(core, source);
        if !missing.is_empty() {
            warn!(
                "OTS {} core {} -> {} is missing {}",
                connection.gui_label,
                core.from_label,
                core.to_label,
                missing.join(", ")
            );
        }
    }
    debug!("OTS {} has {} cores", connection.gui_label, cores.len());
    Ok(cores)
}

/// Power fields of `core` that are absent but needed under `source`
pub fn missing_power_fields(core: &FiberCore, source: PowerSource) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if core.egress_power_out.is_none() {
        missing.push("egressPowerOut");
    }
    if source == PowerSource::CoreReported && core.ingress_power_in.is_none() {
        missing.push("ingressPowerIn");
    }
    missing
}
