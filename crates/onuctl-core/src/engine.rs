// ── Engine entry point ──
//
// Resolves what each work order still needs from the ledger, runs the
// register and configuration phases in order, and reports what changed.
// `run_many` fans distinct ports out over a bounded task pool.

use std::collections::HashSet;
use std::sync::Arc;

use onuctl_shell::{Connector, SshConnector};
use serde::Serialize;
use strum::{Display, EnumString};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::config::{DeviceConfig, EngineTuning};
use crate::error::CoreError;
use crate::model::{ProvisioningRow, UnitStatus, WorkOrder};
use crate::orchestrator::{ConfigurationReport, RegistrationReport, Shared, configure, register};
use crate::store::{Ledger, ProgressBoard, Transcript};

/// Largest number of ports provisioned at once by [`Engine::run_many`].
pub const MAX_PORT_POOL: usize = 8;

/// Which phases a run performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Full,
    Register,
    Config,
}

impl RunMode {
    pub fn registers(self) -> bool {
        matches!(self, Self::Full | Self::Register)
    }

    pub fn configures(self) -> bool {
        matches!(self, Self::Full | Self::Config)
    }
}

/// Ledger counts for the rows of one work order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub registered: usize,
    pub success: usize,
    pub error: usize,
}

/// What a run that touched the device did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub interface: String,
    pub registration: Option<RegistrationReport>,
    pub configuration: Option<ConfigurationReport>,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing left to do; no device command was issued.
    Idle,
    Completed(RunSummary),
}

impl RunOutcome {
    pub fn did_work(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Provisioning engine bound to one device.
///
/// Cheap to clone; clones share the ledger and progress board.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Shared>,
}

impl Engine {
    /// Engine that reaches the device over SSH.
    pub fn new(
        device: DeviceConfig,
        tuning: EngineTuning,
        ledger: Ledger,
        transcript: Transcript,
    ) -> Self {
        let connector = Arc::new(SshConnector::new(device.ssh_target(), device.transport()));
        Self::with_connector(device, tuning, ledger, transcript, connector)
    }

    /// Engine over an arbitrary shell connector.
    pub fn with_connector(
        device: DeviceConfig,
        tuning: EngineTuning,
        ledger: Ledger,
        transcript: Transcript,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                device,
                tuning,
                connector,
                ledger: Arc::new(ledger),
                progress: Arc::new(ProgressBoard::new()),
                transcript: Arc::new(transcript),
            }),
        }
    }

    pub fn progress(&self) -> Arc<ProgressBoard> {
        Arc::clone(&self.inner.progress)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.inner.ledger
    }

    /// Run the phases of `mode` that `order` still needs.
    pub async fn run(&self, order: &WorkOrder, mode: RunMode) -> Result<RunOutcome, CoreError> {
        let span = info_span!(
            "run",
            run_id = %Uuid::new_v4(),
            interface = order.interface(),
            mode = %mode,
        );
        self.run_inner(order, mode).instrument(span).await
    }

    async fn run_inner(&self, order: &WorkOrder, mode: RunMode) -> Result<RunOutcome, CoreError> {
        let shared = &self.inner;
        let interface = order.interface();
        let mut touched = false;

        let mut registration = None;
        if mode.registers() {
            let status = shared.ledger.load_status()?;
            let to_register: Vec<ProvisioningRow> = order
                .rows()
                .iter()
                .filter(|row| {
                    status
                        .get(&row.key())
                        .is_none_or(|s| s.needs_registration())
                })
                .cloned()
                .collect();
            if !to_register.is_empty() {
                shared.progress.queue(interface);
                registration =
                    Some(register::run_registration(shared, interface, &to_register).await?);
                touched = true;
            }
        }

        let mut configuration = None;
        if mode.configures() {
            let status = shared.ledger.load_status()?;
            let unfinished = order
                .rows()
                .iter()
                .filter(|row| status.get(&row.key()) != Some(&UnitStatus::Success));
            let registered: Vec<ProvisioningRow> = unfinished
                .clone()
                .filter(|row| status.get(&row.key()) == Some(&UnitStatus::Registered))
                .cloned()
                .collect();
            if unfinished.count() > 0 {
                shared.progress.queue(interface);
                let report =
                    configure::run_configuration(Arc::clone(shared), interface, registered).await?;
                touched |= report.attempted > 0;
                configuration = Some(report);
            }
        }

        if !touched {
            info!(interface, "nothing to do");
            return Ok(RunOutcome::Idle);
        }

        let counts = self.count_statuses(order)?;
        info!(
            interface,
            pending = counts.pending,
            registered = counts.registered,
            success = counts.success,
            error = counts.error,
            "run finished"
        );
        Ok(RunOutcome::Completed(RunSummary {
            interface: interface.to_owned(),
            registration,
            configuration,
            counts,
        }))
    }

    /// Ledger counts for the rows of `order`.
    pub fn count_statuses(&self, order: &WorkOrder) -> Result<StatusCounts, CoreError> {
        let status = self.inner.ledger.load_status()?;
        let mut counts = StatusCounts::default();
        for row in order.rows() {
            match status.get(&row.key()) {
                Some(UnitStatus::Pending) => counts.pending += 1,
                Some(UnitStatus::Registered) => counts.registered += 1,
                Some(UnitStatus::Success) => counts.success += 1,
                Some(UnitStatus::Error) => counts.error += 1,
                None => {}
            }
        }
        Ok(counts)
    }

    /// Run several single-port orders concurrently, at most `pool_size`
    /// (clamped to `1..=8`) at a time.
    ///
    /// Results come back in input order. Two orders for the same port
    /// are rejected before anything runs.
    pub async fn run_many(
        &self,
        orders: Vec<WorkOrder>,
        mode: RunMode,
        pool_size: usize,
    ) -> Result<Vec<Result<RunOutcome, CoreError>>, CoreError> {
        let mut ports = HashSet::with_capacity(orders.len());
        for order in &orders {
            if !ports.insert(order.interface().to_owned()) {
                return Err(CoreError::DuplicatePort {
                    interface: order.interface().to_owned(),
                });
            }
        }

        let permits = Arc::new(Semaphore::new(pool_size.clamp(1, MAX_PORT_POOL)));
        let mut set = JoinSet::new();
        let total = orders.len();
        for (index, order) in orders.into_iter().enumerate() {
            let engine = self.clone();
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => engine.run(&order, mode).await,
                    Err(e) => Err(CoreError::Internal(e.to_string())),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<RunOutcome, CoreError>>> =
            (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = results.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "port run panicked"),
            }
        }

        Ok(results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(CoreError::Internal("port run aborted".into()))))
            .collect())
    }
}
