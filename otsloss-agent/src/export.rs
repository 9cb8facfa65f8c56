//! CSV export of a loss report

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use otsloss_core::LossRecord;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const REPORT_HEADER: [&str; 7] = [
    "OTS Name",
    "Egress Port",
    "Egress Power",
    "Ingress Port",
    "Ingress Power",
    "Raman Gain",
    "Total Loss",
];

pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("output_{}.csv", at.timestamp())
}

/// Writes the header and one line per record
pub fn write_report<W: Write>(writer: W, records: &[LossRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(REPORT_HEADER)?;
    for record in records {
        csv.write_record([
            record.connection.clone(),
            record.egress_port.clone(),
            record.egress_power.to_string(),
            record.ingress_port.clone(),
            record.ingress_power.to_string(),
            record.raman_gain.to_string(),
            record.total_loss.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes `output_<unix-ts>.csv` under `dir` and returns its path
pub fn export_report(dir: &Path, records: &[LossRecord], at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let path = dir.join(report_file_name(at));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_report(file, records).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
