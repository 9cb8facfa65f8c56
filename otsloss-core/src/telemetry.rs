//! Seam between the engine and the management platform.

use crate::error::{LossError, Result};
use crate::models::{Connection, FiberCore, ManagedConnection, PmQueryResponse};
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::future::Future;

/// Read access to the management platform.
///
/// One client is shared read-only by every task of a run, so implementations
/// must be `Send + Sync` and return `Send` futures.
pub trait TelemetryClient: Send + Sync + 'static {
    /// Full physical-connection inventory
    fn fetch_inventory(&self) -> impl Future<Output = Result<Vec<Connection>>> + Send;

    /// Fiber characteristics of one connection, in platform order
    fn fetch_characteristics(
        &self,
        connection_id: i64,
    ) -> impl Future<Output = Result<Vec<FiberCore>>> + Send;

    /// Connections known to the PM application, with their PM object ids
    fn fetch_managed_connections(
        &self,
    ) -> impl Future<Output = Result<Vec<ManagedConnection>>> + Send;

    /// PM series of one object over `window`
    fn fetch_pm_series(
        &self,
        object_id: &str,
        window: PmWindow,
    ) -> impl Future<Output = Result<PmQueryResponse>> + Send;
}

/// Lookback window of a PM query, at minute granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PmWindow {
    pub const DEFAULT_LOOKBACK_MINUTES: i64 = 60;
    /// One week
    pub const MAX_LOOKBACK_MINUTES: i64 = 10_080;

    /// Window ending at `now` truncated to the minute.
    ///
    /// `minutes` must lie in `1..=MAX_LOOKBACK_MINUTES`.
    pub fn lookback(now: DateTime<Utc>, minutes: i64) -> Result<Self> {
        if !(1..=Self::MAX_LOOKBACK_MINUTES).contains(&minutes) {
            return Err(LossError::InvalidLookback(minutes));
        }
        let end = Self::minute_floor(now);
        let start = Duration::try_minutes(minutes)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or(LossError::InvalidLookback(minutes))?;
        Ok(Self { start, end })
    }

    pub fn last_hour(now: DateTime<Utc>) -> Self {
        let end = Self::minute_floor(now);
        Self {
            start: end - Duration::minutes(Self::DEFAULT_LOOKBACK_MINUTES),
            end,
        }
    }

    fn minute_floor(now: DateTime<Utc>) -> DateTime<Utc> {
        now.duration_trunc(Duration::minutes(1)).unwrap_or(now)
    }
}
