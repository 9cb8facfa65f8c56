//! Concurrent fan-out of a loss run.
//!
//! One task per selected connection fetches characteristics and PM data in
//! parallel, then one task per core computes its row. Finished rows of a
//! connection are appended to a shared sink as a single fragment.

use crate::calculator::{compute_loss, PowerSource};
use crate::characteristics::resolve_cores;
use crate::error::{LossError, Result};
use crate::models::{Connection, LossRecord};
use crate::reconciler::{reconcile_connection, Reconciliation};
use crate::selector::select_connections;
use crate::state::FragmentSink;
use crate::telemetry::{PmWindow, TelemetryClient};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Rows of a completed run
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub records: Vec<LossRecord>,
    /// Labels of connections skipped for lack of telemetry
    pub skipped: Vec<String>,
    pub selected: usize,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows of one connection, in characteristics order
    pub fn rows_for<'a>(&'a self, connection: &'a str) -> impl Iterator<Item = &'a LossRecord> {
        self.records
            .iter()
            .filter(move |record| record.connection == connection)
    }
}

#[derive(Debug)]
enum ConnectionOutcome {
    Reported(usize),
    Skipped(String),
}

/// Runs the selection, reconciliation and loss computation for one LD type.
pub struct LossEngine<C> {
    client: Arc<C>,
    ld_type: Arc<str>,
    window: PmWindow,
}

impl<C: TelemetryClient> LossEngine<C> {
    pub fn new(client: Arc<C>, ld_type: impl Into<String>, window: PmWindow) -> Self {
        Self {
            client,
            ld_type: Arc::from(ld_type.into()),
            window,
        }
    }

    pub fn ld_type(&self) -> &str {
        &self.ld_type
    }

    /// Computes every row of the run.
    ///
    /// Connections without telemetry are skipped. The first fatal error
    /// aborts the remaining tasks. A run that yields no row at all fails with
    /// [`LossError::EmptyReport`].
    pub async fn run(&self) -> Result<Report> {
        let inventory = self.client.fetch_inventory().await?;
        let selected = select_connections(&inventory, &self.ld_type);
        if selected.is_empty() {
            warn!("No OTS connection carries LD type {}", self.ld_type);
            return Err(LossError::EmptyReport {
                selected: 0,
                skipped: 0,
            });
        }

        let pm_objects = self.pm_object_index().await?;
        let sink = FragmentSink::new();
        let mut tasks = JoinSet::new();

        for connection in selected.iter().cloned() {
            let object_id = pm_objects.get(&connection.gui_label).cloned();
            tasks.spawn(process_connection(
                Arc::clone(&self.client),
                connection,
                object_id,
                Arc::clone(&self.ld_type),
                self.window,
                sink.clone(),
            ));
        }

        let mut skipped = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined?? {
                ConnectionOutcome::Reported(rows) => {
                    debug!("Connection task produced {} rows", rows)
                }
                ConnectionOutcome::Skipped(label) => skipped.push(label),
            }
        }

        let records = sink.drain();
        info!(
            "Computed {} loss rows over {} OTS ({} without PM data)",
            records.len(),
            selected.len(),
            skipped.len()
        );

        if records.is_empty() {
            return Err(LossError::EmptyReport {
                selected: selected.len(),
                skipped: skipped.len(),
            });
        }

        Ok(Report {
            records,
            skipped,
            selected: selected.len(),
        })
    }

    /// Maps display labels to PM object ids; the last duplicate wins.
    async fn pm_object_index(&self) -> Result<HashMap<String, String>> {
        let managed = self.client.fetch_managed_connections().await?;
        debug!("{} connections managed by the PM application", managed.len());

        Ok(managed
            .into_iter()
            .filter_map(|entry| entry.cxn_id.map(|id| (entry.cxn_name, id)))
            .collect())
    }
}

async fn process_connection<C: TelemetryClient>(
    client: Arc<C>,
    connection: Connection,
    object_id: Option<String>,
    ld_type: Arc<str>,
    window: PmWindow,
    sink: FragmentSink<LossRecord>,
) -> Result<ConnectionOutcome> {
    let reconciliation = async {
        match object_id.as_deref() {
            Some(id) => reconcile_connection(&*client, &connection, id, window).await,
            None => {
                warn!("OTS {} is not managed by the PM application", connection.gui_label);
                Ok(Reconciliation::Unavailable)
            }
        }
    };
    let source = PowerSource::for_ld_type(&ld_type);
    let (cores, reconciliation) =
        tokio::try_join!(resolve_cores(&*client, &connection, source), reconciliation)?;

    let power = match reconciliation {
        Reconciliation::Available(power) => Arc::new(power),
        Reconciliation::Unavailable => {
            warn!("Skipping OTS {}: no PM data in the window", connection.gui_label);
            return Ok(ConnectionOutcome::Skipped(connection.gui_label));
        }
    };

    let connection = Arc::new(connection);
    let mut core_tasks = JoinSet::new();
    for (index, core) in cores.into_iter().enumerate() {
        let connection = Arc::clone(&connection);
        let power = Arc::clone(&power);
        let ld_type = Arc::clone(&ld_type);
        core_tasks.spawn(async move {
            let record = compute_loss(&connection, &ld_type, &core, Some(&power))?;
            Ok::<_, LossError>(record.map(|record| (index, record)))
        });
    }

    let mut rows = Vec::new();
    while let Some(joined) = core_tasks.join_next().await {
        if let Some(row) = joined?? {
            rows.push(row);
        }
    }
    rows.sort_by_key(|(index, _)| *index);

    let count = rows.len();
    sink.append(rows.into_iter().map(|(_, record)| record).collect());
    Ok(ConnectionOutcome::Reported(count))
}
