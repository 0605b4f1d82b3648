// ── Phase orchestrators ──
//
// Registration declares identities on a port and waits for the device to
// commit them. Configuration pushes per-unit service blocks from one or
// two concurrent sessions. Both report into the shared ledger and board.

pub mod configure;
pub mod register;

use std::sync::Arc;
use std::time::Duration;

use onuctl_shell::{Connector, Session};
use tokio::time::sleep;

use crate::command::CONFIG_ENTRY;
use crate::config::{DeviceConfig, EngineTuning};
use crate::error::CoreError;
use crate::model::StatusRecord;
use crate::store::{Ledger, ProgressBoard, Transcript};

pub use configure::{ConfigurationReport, partition, worker_count};
pub use register::RegistrationReport;

/// Pause after each mode command so the prompt settles.
const MODE_SETTLE: Duration = Duration::from_millis(200);

/// Everything a phase needs, shared by the engine and its workers.
pub(crate) struct Shared {
    pub device: DeviceConfig,
    pub tuning: EngineTuning,
    pub connector: Arc<dyn Connector>,
    pub ledger: Arc<Ledger>,
    pub progress: Arc<ProgressBoard>,
    pub transcript: Arc<Transcript>,
}

impl Shared {
    /// Fresh session already in global configuration mode.
    pub async fn open_config_session(&self) -> Result<Session, onuctl_shell::Error> {
        let mut session =
            Session::open(Arc::clone(&self.connector), self.tuning.read.clone()).await?;
        if let Err(e) = enter_mode(&mut session, &CONFIG_ENTRY).await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    /// Upsert `records` in order on the blocking pool. Each upsert
    /// rewrites and syncs the ledger file.
    pub async fn record(&self, records: Vec<StatusRecord>) -> Result<(), CoreError> {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || records.iter().try_for_each(|r| ledger.upsert(r)))
            .await
            .map_err(|e| CoreError::Internal(format!("ledger writer task failed: {e}")))?
    }
}

/// Send each mode command in turn, pausing briefly after each.
pub(crate) async fn enter_mode(
    session: &mut Session,
    commands: &[&str],
) -> Result<(), onuctl_shell::Error> {
    for command in commands {
        session.send_default(command).await?;
        sleep(MODE_SETTLE).await;
    }
    Ok(())
}

/// Replace the session's shell with a fresh one in configuration mode.
pub(crate) async fn reconnect(
    session: &mut Session,
    pause: Duration,
) -> Result<(), onuctl_shell::Error> {
    session.close().await;
    sleep(pause).await;
    session.reopen().await?;
    enter_mode(session, &CONFIG_ENTRY).await
}
