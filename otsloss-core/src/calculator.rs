//! Per-core loss computation.

use crate::error::{LossError, Result};
use crate::models::{Connection, FiberCore, LossRecord, RamanGain, RAMAN_GAIN_NOT_APPLICABLE};
use crate::reconciler::ReconciledPower;
use tracing::warn;

/// LD type whose ingress power is read from the Raman card line-in
pub const AMPLIFIER_POLICY_MARKER: &str = "RA2P";

/// Where the ingress power of a core comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
    /// Measured line-in of the amplifier, from PM telemetry
    AmplifierLinein,
    /// The core's own `ingressPowerIn`
    CoreReported,
}

impl PowerSource {
    pub fn for_ld_type(ld_type: &str) -> Self {
        if ld_type == AMPLIFIER_POLICY_MARKER {
            PowerSource::AmplifierLinein
        } else {
            PowerSource::CoreReported
        }
    }
}

/// Computes the loss row of one core.
///
/// Returns `Ok(None)` when the amplifier policy applies and no reading exists
/// for the core's destination port. Unparseable or missing powers, and a
/// non-`N.A.` Raman gain that is not a number, fail the run.
pub fn compute_loss(
    connection: &Connection,
    ld_type: &str,
    core: &FiberCore,
    power: Option<&ReconciledPower>,
) -> Result<Option<LossRecord>> {
    let ingress_power = match PowerSource::for_ld_type(ld_type) {
        PowerSource::AmplifierLinein => {
            match power.and_then(|power| power.get(&core.to_label)) {
                Some(reading) => reading.value,
                None => {
                    warn!(
                        "No line-in reading for {} on OTS {}, core skipped",
                        core.to_label, connection.gui_label
                    );
                    return Ok(None);
                }
            }
        }
        PowerSource::CoreReported => parse_power(
            connection,
            &core.to_label,
            "ingressPowerIn",
            core.ingress_power_in.as_deref(),
        )?,
    };

    let egress_power = parse_power(
        connection,
        &core.from_label,
        "egressPowerOut",
        core.egress_power_out.as_deref(),
    )?;
    let raman_gain = parse_raman_gain(connection, core)?;

    let total_loss = match raman_gain {
        RamanGain::Gain(gain) => egress_power - ingress_power + gain,
        RamanGain::NotApplicable => egress_power - ingress_power,
    };

    Ok(Some(LossRecord {
        connection: connection.gui_label.clone(),
        egress_port: core.from_label.clone(),
        egress_power,
        ingress_port: core.to_label.clone(),
        ingress_power,
        raman_gain,
        total_loss,
    }))
}

fn parse_power(
    connection: &Connection,
    port: &str,
    field: &'static str,
    raw: Option<&str>,
) -> Result<f64> {
    let raw = raw.ok_or_else(|| LossError::MissingField {
        field,
        connection: connection.gui_label.clone(),
        port: port.to_string(),
    })?;
    raw.trim().parse::<f64>().map_err(|_| LossError::InvalidNumber {
        field,
        value: raw.to_string(),
        connection: connection.gui_label.clone(),
        port: port.to_string(),
    })
}

// The sentinel is compared before any parse attempt.
fn parse_raman_gain(connection: &Connection, core: &FiberCore) -> Result<RamanGain> {
    match core.raman_gain.as_deref() {
        Some(RAMAN_GAIN_NOT_APPLICABLE) => Ok(RamanGain::NotApplicable),
        raw => parse_power(connection, &core.to_label, "targetGainStr", raw).map(RamanGain::Gain),
    }
}
