//! OTS loss engine
//!
//! Computes the optical loss of every core of the OTS connections carrying a
//! given line-amplifier type, from two NFM-T sources:
//! - static fiber characteristics (egress power, Raman gain, reported ingress)
//! - Next-Gen PM telemetry (measured receive power of the far-end ports)
//!
//! For Raman-amplified spans (`RA2P`) the amplifier's measured line-in power
//! replaces the ingress power the core reports for itself.
//!
//! The platform is reached through [`TelemetryClient`]; this crate does no
//! I/O of its own.

pub mod calculator;
pub mod characteristics;
pub mod error;
pub mod models;
pub mod reconciler;
pub mod scheduler;
pub mod selector;
pub mod state;
pub mod telemetry;

pub use calculator::{compute_loss, PowerSource, AMPLIFIER_POLICY_MARKER};
pub use error::{LossError, Result};
pub use models::{Connection, FiberCore, LossRecord, ManagedConnection, PmQueryResponse, RamanGain};
pub use reconciler::{Reconciliation, ReconciledPower};
pub use scheduler::{LossEngine, Report};
pub use selector::select_connections;
pub use telemetry::{PmWindow, TelemetryClient};
