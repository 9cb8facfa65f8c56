/*!
Test harness for loss runs

Wires a [`MockTelemetryClient`] into a [`LossEngine`] with:
- a fixed clock, so PM windows and timestamps are reproducible
- scenario helpers that register a connection with its cores and PM rows
- assertions on the rows of a finished run
*/

use crate::fixtures::{pm_response, raman_ots};
use crate::mock_client::{MockEndpoint, MockTelemetryClient};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use otsloss_core::telemetry::PmWindow;
use otsloss_core::{LossEngine, Report};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Harness around one mocked NFM-T instance
pub struct TestHarness {
    pub client: Arc<MockTelemetryClient>,
    ld_type: String,
    now: DateTime<Utc>,
}

impl TestHarness {
    /// Harness for `ld_type`, with the clock at 2024-01-02 11:00 UTC
    pub fn new(ld_type: &str) -> Self {
        env_logger::try_init().ok();

        Self {
            client: Arc::new(MockTelemetryClient::new()),
            ld_type: ld_type.to_string(),
            now: Utc
                .with_ymd_and_hms(2024, 1, 2, 11, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn window(&self) -> PmWindow {
        PmWindow::last_hour(self.now)
    }

    pub fn engine(&self) -> LossEngine<MockTelemetryClient> {
        LossEngine::new(Arc::clone(&self.client), self.ld_type.clone(), self.window())
    }

    /// PM object id the harness assigns to a connection id
    pub fn pm_object_id(connection_id: i64) -> String {
        format!("pm-{}", connection_id)
    }

    /// Registers a Raman OTS (see [`raman_ots`]) with its cores, managed by
    /// the PM application when `pm_rows` is given
    pub fn add_raman_ots(
        &self,
        id: i64,
        label: &str,
        cores: Vec<Value>,
        pm_rows: Option<Vec<Value>>,
    ) -> &Self {
        self.client
            .add_connection(raman_ots(id, label).build())
            .set_characteristics(id, Value::Array(cores));

        if let Some(rows) = pm_rows {
            let object_id = Self::pm_object_id(id);
            self.client
                .add_managed(label, &object_id)
                .set_pm_series(&object_id, pm_response(rows));
        }
        log::info!("Registered OTS {} (id {})", label, id);
        self
    }

    pub async fn run(&self) -> otsloss_core::Result<Report> {
        self.engine().run().await
    }

    /// Fails unless `connection` has exactly `expected` losses, in order
    pub fn assert_losses(&self, report: &Report, connection: &str, expected: &[f64]) -> Result<()> {
        let actual: Vec<f64> = report.rows_for(connection).map(|row| row.total_loss).collect();
        if actual.len() != expected.len() {
            anyhow::bail!(
                "OTS '{}': expected {} rows, got {} ({:?})",
                connection,
                expected.len(),
                actual.len(),
                actual
            );
        }

        for (index, (got, want)) in actual.iter().zip(expected).enumerate() {
            if (got - want).abs() > 1e-9 {
                anyhow::bail!(
                    "OTS '{}' row {}: expected loss {}, got {}",
                    connection,
                    index,
                    want,
                    got
                );
            }
        }
        Ok(())
    }

    /// Fails unless `connection` was skipped for lack of telemetry
    pub fn assert_skipped(&self, report: &Report, connection: &str) -> Result<()> {
        if !report.skipped.iter().any(|label| label == connection) {
            anyhow::bail!("OTS '{}' not skipped (skipped: {:?})", connection, report.skipped);
        }
        if report.rows_for(connection).next().is_some() {
            anyhow::bail!("OTS '{}' skipped but has rows", connection);
        }
        Ok(())
    }

    pub fn get_stats(&self) -> RunStats {
        let mut calls = HashMap::new();
        for endpoint in [
            MockEndpoint::Inventory,
            MockEndpoint::Characteristics,
            MockEndpoint::ManagedConnections,
            MockEndpoint::PmSeries,
        ] {
            calls.insert(endpoint, self.client.call_count(endpoint));
        }
        RunStats { calls }
    }
}

#[derive(Debug)]
pub struct RunStats {
    pub calls: HashMap<MockEndpoint, usize>,
}

impl RunStats {
    pub fn count(&self, endpoint: MockEndpoint) -> usize {
        self.calls.get(&endpoint).copied().unwrap_or(0)
    }

    pub fn print(&self) {
        println!("Mock NFM-T calls:");
        for (endpoint, count) in &self.calls {
            println!("  {:?}: {}", endpoint, count);
        }
    }
}

/// Declares a `#[tokio::test]` that gets a fresh [`TestHarness`] for an LD type
#[macro_export]
macro_rules! loss_test {
    ($name:ident, $ld_type:expr, |$harness:ident| $body:block) => {
        #[tokio::test]
        async fn $name() {
            async fn scenario($harness: &$crate::test_utils::TestHarness) -> anyhow::Result<()> $body

            let harness = $crate::test_utils::TestHarness::new($ld_type);
            match scenario(&harness).await {
                Ok(()) => harness.get_stats().print(),
                Err(e) => panic!("Test '{}' failed: {}", stringify!($name), e),
            }
        }
    };
}
