// ── Registration phase ──
//
// Sends register blocks in fixed-size batches, flushes the device buffer
// by reconnecting every `flush_every` units, then waits for the commit
// and promotes confirmed units to `registered`.

use std::collections::BTreeSet;

use onuctl_shell::Session;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{Shared, reconnect};
use crate::command::{WRITE_COMMAND, build_register_block};
use crate::error::CoreError;
use crate::model::{ProvisioningRow, StatusRecord, UnitStatus};
use crate::verify::{CommitReport, wait_until_committed};

pub(crate) const MSG_SENT: &str = "Command sent, waiting for OLT commit";
pub(crate) const MSG_CONFIRMED: &str = "OLT commit confirmed";
pub(crate) const MSG_STILL_PENDING: &str = "Still waiting for OLT commit (skipped in config)";

/// Outcome of one registration phase on one port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Units whose register command was sent.
    pub sent: usize,
    pub batches: usize,
    /// Buffer flushes performed.
    pub flushes: usize,
    pub commit: CommitReport,
}

impl RegistrationReport {
    pub fn confirmed(&self) -> usize {
        self.commit.confirmed.len()
    }

    pub fn still_pending(&self) -> usize {
        self.commit.missing.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegisterState {
    NotStarted,
    Batching { next: usize },
    AwaitingCommit,
    Done,
}

/// Register `rows` on `interface`.
///
/// Progress runs from `0/rows.len()` and counts confirmed units only. It
/// is finished, and the session closed, on every exit path.
pub(crate) async fn run_registration(
    shared: &Shared,
    interface: &str,
    rows: &[ProvisioningRow],
) -> Result<RegistrationReport, CoreError> {
    shared.progress.start(interface, rows.len());
    let mut session = None;

    let result = drive(shared, interface, rows, &mut session).await;

    if let Some(mut session) = session {
        session.close().await;
    }
    shared.progress.finish(interface);
    result
}

async fn drive(
    shared: &Shared,
    interface: &str,
    rows: &[ProvisioningRow],
    slot: &mut Option<Session>,
) -> Result<RegistrationReport, CoreError> {
    let tuning = &shared.tuning.registration;
    let batches: Vec<&[ProvisioningRow]> = rows.chunks(tuning.batch_size.max(1)).collect();
    let mut report = RegistrationReport::default();
    let mut since_flush = 0usize;
    let mut state = RegisterState::NotStarted;

    loop {
        state = match state {
            RegisterState::NotStarted => {
                info!(interface, units = rows.len(), batches = batches.len(), "registration starting");
                *slot = Some(shared.open_config_session().await?);
                RegisterState::Batching { next: 0 }
            }
            RegisterState::Batching { next } if next >= batches.len() => {
                debug!(interface, sent = report.sent, "all register batches sent");
                RegisterState::AwaitingCommit
            }
            RegisterState::Batching { next } => {
                let batch = batches[next];
                let session = slot
                    .as_mut()
                    .ok_or_else(|| CoreError::Internal("register session missing".into()))?;
                let number = next + 1;

                send_batch(shared, session, interface, number, batch).await?;
                shared
                    .record(
                        batch
                            .iter()
                            .map(|row| StatusRecord::for_row(row, UnitStatus::Pending, MSG_SENT))
                            .collect(),
                    )
                    .await?;
                report.sent += batch.len();
                report.batches = number;
                sleep(tuning.batch_delay).await;

                since_flush += batch.len();
                if since_flush >= tuning.flush_every.max(1) {
                    flush_buffer(shared, session, interface).await?;
                    report.flushes += 1;
                    since_flush = 0;
                }
                RegisterState::Batching { next: number }
            }
            RegisterState::AwaitingCommit => {
                let session = slot
                    .as_mut()
                    .ok_or_else(|| CoreError::Internal("register session missing".into()))?;
                sleep(tuning.settle_before_verify).await;

                let expected: BTreeSet<String> = rows.iter().map(ProvisioningRow::onu_id_text).collect();
                report.commit =
                    wait_until_committed(session, interface, &expected, &shared.tuning.commit).await;
                record_commit(shared, interface, rows, &report.commit).await?;
                RegisterState::Done
            }
            RegisterState::Done => return Ok(report),
        };
    }
}

/// Send one register block, resending once on a fresh session when the
/// first attempt fails or comes back empty.
async fn send_batch(
    shared: &Shared,
    session: &mut Session,
    interface: &str,
    number: usize,
    batch: &[ProvisioningRow],
) -> Result<(), CoreError> {
    let block = build_register_block(interface, batch, &shared.device.onu_type);
    let heading = format!("REGISTER {interface} BATCH {number}");

    match session.send_default(&block).await {
        Ok(output) if !output.trim().is_empty() => {
            shared.transcript.record(&heading, &output);
            debug!(interface, batch = number, units = batch.len(), "register batch sent");
            return Ok(());
        }
        Ok(_) => warn!(interface, batch = number, "register batch produced no output, probable drop"),
        Err(e) => warn!(interface, batch = number, error = %e, "register batch send failed"),
    }

    reconnect(session, shared.tuning.registration.reconnect_pause).await?;

    match session.send_default(&block).await {
        Ok(output) => {
            if output.trim().is_empty() {
                warn!(interface, batch = number, "register batch still silent after resend, continuing");
            }
            shared.transcript.record(&format!("{heading} (resend)"), &output);
            Ok(())
        }
        Err(e) => Err(CoreError::Drop {
            interface: interface.to_owned(),
            batch: number,
            reason: e.to_string(),
        }),
    }
}

/// Optionally persist, then reconnect so the device releases its pending
/// identity buffer.
async fn flush_buffer(shared: &Shared, session: &mut Session, interface: &str) -> Result<(), CoreError> {
    let tuning = &shared.tuning.registration;
    if shared.device.auto_write {
        let delay = session.timing().send_delay;
        match session.send_awaiting_prompt(WRITE_COMMAND, delay, tuning.write_window).await {
            Ok(output) => shared.transcript.record(&format!("WRITE {interface}"), &output),
            Err(e) => warn!(interface, error = %e, "write before buffer flush failed"),
        }
    }
    info!(interface, "flushing device buffer");
    reconnect(session, tuning.reconnect_pause).await?;
    Ok(())
}

async fn record_commit(
    shared: &Shared,
    interface: &str,
    rows: &[ProvisioningRow],
    commit: &CommitReport,
) -> Result<(), CoreError> {
    let records: Vec<StatusRecord> = rows
        .iter()
        .map(|row| {
            if commit.confirmed.contains(&row.onu_id_text()) {
                StatusRecord::for_row(row, UnitStatus::Registered, MSG_CONFIRMED)
            } else {
                StatusRecord::for_row(row, UnitStatus::Pending, MSG_STILL_PENDING)
            }
        })
        .collect();
    shared.record(records).await?;
    shared.progress.advance(interface, commit.confirmed.len());
    if let Some(err) = commit.timeout_error(interface) {
        warn!(interface, "{err}");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::PhaseStatus;
    use crate::testing::{FakeOlt, PORT, order, shared};

    #[tokio::test(start_paused = true)]
    async fn confirmed_units_become_registered() {
        let dir = tempfile::tempdir().unwrap();
        let olt = FakeOlt::new();
        let shared = shared(&olt, dir.path());
        let order = order(1..=3);

        let report = run_registration(&shared, PORT, order.rows()).await.unwrap();

        assert_eq!(report.sent, 3);
        assert_eq!(report.confirmed(), 3);
        let records = shared.ledger.records().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.status == UnitStatus::Registered));
        assert!(records.iter().all(|r| r.message == MSG_CONFIRMED));
        let progress = shared.progress.get(PORT).unwrap();
        assert_eq!((progress.done, progress.total), (3, 3));
        assert_eq!(progress.status, PhaseStatus::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_reconnects_once_before_ledger_write() {
        let dir = tempfile::tempdir().unwrap();
        let olt = FakeOlt::new();
        let ledger_path = dir.path().join("status.csv");
        olt.with_state(|s| {
            s.drop_register_batches = 1;
            s.observe_path = Some(ledger_path.clone());
        });
        let shared = shared(&olt, dir.path());

        let report = run_registration(&shared, PORT, order(1..=2).rows())
            .await
            .unwrap();

        assert_eq!(olt.register_sends(), 2);
        assert_eq!(olt.with_state(|s| s.path_seen_at_open.clone()), vec![false, false]);
        assert_eq!(report.confirmed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn buffer_is_flushed_every_flush_interval() {
        let dir = tempfile::tempdir().unwrap();
        let olt = FakeOlt::new();
        let mut shared = shared(&olt, dir.path());
        shared.device.auto_write = true;

        let report = run_registration(&shared, PORT, order(1..=100).rows())
            .await
            .unwrap();

        assert_eq!(report.batches, 4);
        assert_eq!(report.flushes, 1);
        assert_eq!(olt.opens(), 2);
        assert_eq!(olt.commands().iter().filter(|c| *c == "write\n").count(), 1);
        assert_eq!(shared.ledger.records().unwrap().len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_without_auto_write_only_reconnects() {
        let dir = tempfile::tempdir().unwrap();
        let olt = FakeOlt::new();
        let shared = shared(&olt, dir.path());
        assert!(!shared.device.auto_write);

        let report = run_registration(&shared, PORT, order(1..=100).rows())
            .await
            .unwrap();

        assert_eq!(report.flushes, 1);
        assert_eq!(olt.opens(), 2);
        assert!(!olt.commands().iter().any(|c| c == "write\n"));
        assert_eq!(report.confirmed(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn second_send_failure_aborts_with_drop() {
        let dir = tempfile::tempdir().unwrap();
        let olt = FakeOlt::new();
        olt.with_state(|s| s.lose_register_batches = 2);
        let shared = shared(&olt, dir.path());

        let err = run_registration(&shared, PORT, order(1..=3).rows())
            .await
            .unwrap_err();

        match err {
            CoreError::Drop { interface, batch, .. } => {
                assert_eq!(interface, PORT);
                assert_eq!(batch, 1);
            }
            other => panic!("expected Drop, got {other:?}"),
        }
        assert_eq!(olt.register_sends(), 2);
        assert_eq!(olt.opens(), 2);
        assert_eq!(olt.state_queries(), 0);
        assert!(shared.ledger.records().unwrap().is_empty());
        assert!(shared.progress.get(PORT).unwrap().is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_units_stay_pending() {
        let dir = tempfile::tempdir().unwrap();
        let olt = FakeOlt::new();
        olt.with_state(|s| {
            s.hidden.insert(2);
        });
        let shared = shared(&olt, dir.path());

        let report = run_registration(&shared, PORT, order(1..=3).rows())
            .await
            .unwrap();

        assert_eq!(report.still_pending(), 1);
        assert!(report.commit.extended);
        let pending: Vec<_> = shared
            .ledger
            .records()
            .unwrap()
            .into_iter()
            .filter(|r| r.status == UnitStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].onu_id, "2");
        assert_eq!(pending[0].message, MSG_STILL_PENDING);
        assert_eq!(shared.progress.get(PORT).unwrap().done, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_aborts_and_finishes_progress() {
        let dir = tempfile::tempdir().unwrap();
        let olt = FakeOlt::new();
        olt.with_state(|s| {
            s.open_failures.insert(1);
        });
        let shared = shared(&olt, dir.path());

        let err = run_registration(&shared, PORT, order(1..=3).rows())
            .await
            .unwrap_err();

        assert!(err.is_connect_failure());
        assert!(shared.ledger.records().unwrap().is_empty());
        assert!(shared.progress.get(PORT).unwrap().is_finished());
    }
}
