// ── Configuration phase ──
//
// Registered units are split round-robin across one or two workers. Each
// worker owns its own session, pushes one service block per unit and
// reconnects once when its shell drops mid-unit.

use std::sync::Arc;

use onuctl_shell::Session;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{Instrument, debug, info, info_span, warn};

use super::{Shared, reconnect};
use crate::command::{build_config_block, first_error_line};
use crate::error::CoreError;
use crate::model::{ProvisioningRow, StatusRecord, UnitStatus};

pub(crate) const MSG_OK: &str = "Configured OK";
pub(crate) const MSG_OK_AFTER_RECONNECT: &str = "Configured after reconnect";

/// Outcome of one configuration phase on one port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationReport {
    pub workers: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ConfigurationReport {
    fn absorb(&mut self, tally: &WorkerTally) {
        self.attempted += tally.attempted;
        self.succeeded += tally.succeeded;
        self.failed += tally.failed;
    }
}

#[derive(Debug, Default)]
struct WorkerTally {
    attempted: usize,
    succeeded: usize,
    failed: usize,
}

/// Concurrent sessions for `rows` units.
///
/// An explicit request wins, capped to the row count. Otherwise one
/// worker up to `single_worker_limit` units and two beyond it.
pub fn worker_count(rows: usize, requested: Option<usize>, single_worker_limit: usize) -> usize {
    if rows == 0 {
        return 0;
    }
    match requested {
        Some(n) => n.clamp(1, rows),
        None if rows <= single_worker_limit => 1,
        None => 2,
    }
}

/// Deal `rows` round-robin into `workers` lists, preserving order within
/// each list.
pub fn partition<T: Clone>(rows: &[T], workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut parts: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (index, row) in rows.iter().enumerate() {
        if let Some(part) = parts.get_mut(index % workers) {
            part.push(row.clone());
        }
    }
    parts
}

/// Configure `rows` (all currently `registered`) on `interface`.
///
/// A worker that cannot connect leaves its rows untouched; the first such
/// error is returned once every worker has finished.
pub(crate) async fn run_configuration(
    shared: Arc<Shared>,
    interface: &str,
    rows: Vec<ProvisioningRow>,
) -> Result<ConfigurationReport, CoreError> {
    shared.progress.start(interface, rows.len());

    let tuning = &shared.tuning.configuration;
    let workers = worker_count(rows.len(), shared.device.config_workers, tuning.single_worker_limit);
    let mut report = ConfigurationReport {
        workers,
        ..ConfigurationReport::default()
    };
    if workers == 0 {
        shared.progress.finish(interface);
        return Ok(report);
    }
    info!(interface, units = rows.len(), workers, "configuration starting");

    let stagger = tuning.worker_stagger;
    let mut set = JoinSet::new();
    for (index, assigned) in partition(&rows, workers).into_iter().enumerate() {
        let shared = Arc::clone(&shared);
        let interface = interface.to_owned();
        let delay = stagger.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
        let span = info_span!("worker", worker = index + 1);
        set.spawn(
            async move {
                sleep(delay).await;
                run_worker(&shared, &interface, assigned).await
            }
            .instrument(span),
        );
    }

    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(tally)) => report.absorb(&tally),
            Ok(Err(e)) => {
                warn!(interface, error = %e, "configuration worker aborted");
                first_error.get_or_insert(e);
            }
            Err(e) => {
                warn!(interface, error = %e, "configuration worker panicked");
                first_error.get_or_insert(CoreError::Internal(e.to_string()));
            }
        }
    }

    shared.progress.finish(interface);
    info!(
        interface,
        succeeded = report.succeeded,
        failed = report.failed,
        "configuration finished"
    );
    first_error.map_or(Ok(report), Err)
}

async fn run_worker(
    shared: &Shared,
    interface: &str,
    rows: Vec<ProvisioningRow>,
) -> Result<WorkerTally, CoreError> {
    let mut session = match shared.open_config_session().await {
        Ok(session) => session,
        Err(e) => {
            warn!(interface, units = rows.len(), error = %e, "worker cannot connect, units stay registered");
            return Err(e.into());
        }
    };

    let mut tally = WorkerTally::default();
    let mut outcome = Ok(());
    for row in &rows {
        let (status, message) = configure_row(shared, &mut session, row).await;
        if let Err(e) = shared
            .record(vec![StatusRecord::for_row(row, status, &message)])
            .await
        {
            outcome = Err(e);
            break;
        }
        shared.progress.advance(interface, 1);

        tally.attempted += 1;
        if status == UnitStatus::Success {
            tally.succeeded += 1;
        } else {
            tally.failed += 1;
        }
        debug!(onu_id = row.onu_id, status = %status, detail = %message, "unit configured");
    }

    session.close().await;
    outcome.map(|()| tally)
}

/// Push one unit's block, reconnecting once on a drop.
async fn configure_row(
    shared: &Shared,
    session: &mut Session,
    row: &ProvisioningRow,
) -> (UnitStatus, String) {
    let block = build_config_block(row, &shared.device.vlan_prefix);
    let heading = format!("CONFIG {} ONU {}", row.interface, row.onu_id);

    match session.send_default(&block).await {
        Ok(output) if !output.trim().is_empty() => {
            shared.transcript.record(&heading, &output);
            return classify(row, &output, MSG_OK);
        }
        Ok(_) => warn!(onu_id = row.onu_id, "config block produced no output, reconnecting"),
        Err(e) if e.is_connection_loss() => {
            warn!(onu_id = row.onu_id, error = %e, "shell lost during config, reconnecting");
        }
        Err(e) => return (UnitStatus::Error, format!("Exception: {e}")),
    }

    if let Err(e) = reconnect(session, shared.tuning.registration.reconnect_pause).await {
        return (UnitStatus::Error, format!("Retry failed: {e}"));
    }
    match session.send_default(&block).await {
        Ok(output) if !output.trim().is_empty() => {
            shared.transcript.record(&format!("{heading} (retry)"), &output);
            classify(row, &output, MSG_OK_AFTER_RECONNECT)
        }
        Ok(_) => (
            UnitStatus::Error,
            "Retry failed: no output after reconnect".to_owned(),
        ),
        Err(e) => (UnitStatus::Error, format!("Retry failed: {e}")),
    }
}

fn classify(row: &ProvisioningRow, output: &str, ok: &str) -> (UnitStatus, String) {
    match first_error_line(output) {
        Some(line) => {
            let err = CoreError::Command {
                interface: row.interface.clone(),
                onu_id: row.onu_id_text(),
                detail: line.to_owned(),
            };
            (UnitStatus::Error, err.to_string())
        }
        None => (UnitStatus::Success, ok.to_owned()),
    }
}
