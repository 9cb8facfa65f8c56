//! Error taxonomy for a loss run.
//!
//! Every variant here aborts the run. Missing telemetry for a single
//! connection is not an error, see [`crate::reconciler::Reconciliation`].

/// Errors raised while collecting telemetry or computing losses
#[derive(Debug, thiserror::Error)]
pub enum LossError {
    #[error("authentication against {host} rejected: HTTP {status}")]
    Auth { host: String, status: u16 },

    #[error("{call} failed: {message}")]
    Transport { call: String, message: String },

    #[error("{call} returned HTTP {status}")]
    Status { call: String, status: u16 },

    #[error("{call} returned an unexpected document: {source}")]
    Decode {
        call: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing {field} for port {port} on OTS {connection}")]
    MissingField {
        field: &'static str,
        connection: String,
        port: String,
    },

    #[error("invalid {field} value {value:?} for port {port} on OTS {connection}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        connection: String,
        port: String,
    },

    #[error("PM sample has no Time field")]
    MissingSampleTime,

    #[error("PM sample time {0:?} is not in MM/DD/YYYY HH:MM form")]
    MalformedTimestamp(String),

    #[error("PM lookback of {0} minutes is outside 1..=10080")]
    InvalidLookback(i64),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("no PM data collected: {selected} OTS selected, {skipped} without telemetry")]
    EmptyReport { selected: usize, skipped: usize },
}

impl LossError {
    /// True when the upstream data itself is corrupt, as opposed to the
    /// platform being unreachable or the run matching nothing.
    pub fn is_fatal_data(&self) -> bool {
        matches!(
            self,
            LossError::Decode { .. }
                | LossError::MissingField { .. }
                | LossError::InvalidNumber { .. }
                | LossError::MissingSampleTime
                | LossError::MalformedTimestamp(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LossError>;
